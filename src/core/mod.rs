pub mod config;
pub mod driver;

pub use config::{BrowserConfig, Config, SessionConfig, WaitConfig};
pub use driver::{Driver, ElementHandle, NativeProperty, ScriptArg, ScriptValue, SearchRoot};
