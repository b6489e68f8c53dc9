use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Element click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Chrome error: {0}")]
    ChromeError(String),
}

impl DriverError {
    pub fn is_absence(&self) -> bool {
        matches!(self, DriverError::NoSuchElement(_) | DriverError::Timeout(_))
    }

    pub fn is_click_obstruction(&self) -> bool {
        matches!(
            self,
            DriverError::NotInteractable(_) | DriverError::ClickIntercepted(_)
        )
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum UnearthtimeError {
    #[error("No arguments provided for parameterized term(s) of {0}")]
    MissingArguments(String),

    #[error("Locator takes no arguments: {0}")]
    UnexpectedArguments(String),

    #[error("No driver or element provided to locate element")]
    NoParent,

    #[error("Mismatched term/selector-kind pairs: {terms} terms, {kinds} selector kinds")]
    MismatchedPairs { terms: usize, kinds: usize },

    #[error("Unrecognized selector kind: {0}")]
    UnrecognizedSelectorKind(String),

    #[error("Invalid attribute: {0} is not an attribute of this element")]
    InvalidAttribute(String),

    #[error("{name} expects {expected} argument(s), got {given}")]
    ArityMismatch {
        name: String,
        expected: usize,
        given: usize,
    },

    #[error("Index {index} out of range for HitList of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Driver is already controlling an EarthTime page")]
    DriverInUse,

    #[error("Url is not an EarthTime page: {0}")]
    InvalidUrl(String),

    #[error("EarthTime page is not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, UnearthtimeError>;

// Convert anyhow::Error to UnearthtimeError
impl From<anyhow::Error> for UnearthtimeError {
    fn from(err: anyhow::Error) -> Self {
        UnearthtimeError::AnyhowError(err.to_string())
    }
}

impl UnearthtimeError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            UnearthtimeError::MissingArguments(_)
                | UnearthtimeError::UnexpectedArguments(_)
                | UnearthtimeError::NoParent
                | UnearthtimeError::MismatchedPairs { .. }
                | UnearthtimeError::UnrecognizedSelectorKind(_)
        )
    }
}
