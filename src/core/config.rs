use crate::errors::{Result, UnearthtimeError};
use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub wait: WaitConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub load_settle_ms: u64,
    pub goto_settle_ms: u64,
    pub click_settle_ms: u64,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            UnearthtimeError::ConfigurationError(format!("{}: {}", path.display(), e))
        })
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            poll_interval_ms: poll_interval.as_millis() as u64,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SessionConfig {
    pub fn immediate() -> Self {
        Self {
            load_settle_ms: 0,
            goto_settle_ms: 0,
            click_settle_ms: 0,
        }
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            args: vec![],
            timeout_ms: 30000,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2500,
            poll_interval_ms: 250,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            load_settle_ms: 5000,
            goto_settle_ms: 2500,
            click_settle_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"wait": {"timeout_ms": 100}}"#).unwrap();
        assert_eq!(config.wait.timeout_ms, 100);
        assert_eq!(config.wait.poll_interval_ms, 250);
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.browser.headless);
    }

    #[test]
    fn wait_durations() {
        let wait = WaitConfig::new(Duration::from_millis(40), Duration::from_millis(5));
        assert_eq!(wait.timeout(), Duration::from_millis(40));
        assert_eq!(wait.poll_interval(), Duration::from_millis(5));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::from_file("/nonexistent/unearthtime.json").unwrap_err();
        assert!(matches!(err, UnearthtimeError::IoError(_)));
    }
}
