pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod testing;
pub mod types;
pub mod utils;

#[cfg(feature = "chrome")]
pub use browser::ChromeDriver;
pub use browser::{EarthTime, LookupKey, SessionManager, Timelapse};
pub use core::{Config, Driver, ElementHandle, ScriptArg, ScriptValue, SearchRoot, WaitConfig};
pub use dom::{
    find, find_all, Condition, Hit, HitList, Locator, Parent, Registry, Response, SelectorKind,
    Term,
};
pub use errors::{DriverError, Result, UnearthtimeError};
pub use types::*;
