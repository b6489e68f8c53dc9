#[cfg(feature = "chrome")]
pub mod chrome;
pub mod session;
pub mod timelapse;

#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
pub use session::{
    validate_url, DriverLease, EarthTime, HistoryEntry, LookupKey, SessionManager, EXPLORE_URL,
};
pub use timelapse::Timelapse;
