use crate::core::{
    BrowserConfig, Driver, ElementHandle, NativeProperty, ScriptArg, ScriptValue, SearchRoot,
};
use crate::dom::SelectorKind;
use crate::errors::{DriverError, DriverResult, Result, UnearthtimeError};
use crate::types::ElementRect;
use crate::utils::javascript::{self, Reply};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// [`Driver`] backed by a local Chrome through the DevTools protocol.
pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
    session_id: String,
}

impl ChromeDriver {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let timeout = Duration::from_millis(config.timeout_ms);

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .idle_browser_timeout(timeout)
            .args(args)
            .build()
            .map_err(|e| UnearthtimeError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| UnearthtimeError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| UnearthtimeError::LaunchFailed(e.to_string()))?;
        tab.set_default_timeout(timeout);

        let session_id = uuid::Uuid::new_v4().to_string();
        info!("Launched Chrome session {}", session_id);

        Ok(Self {
            _browser: browser,
            tab,
            session_id,
        })
    }

    fn evaluate(&self, body: &str) -> DriverResult<Reply> {
        let result = self
            .tab
            .evaluate(&javascript::wrap(body), false)
            .map_err(|e| DriverError::JavaScriptFailed(e.to_string()))?;

        let raw = match result.value {
            Some(Value::String(raw)) => raw,
            other => {
                return Err(DriverError::JavaScriptFailed(format!(
                    "unexpected evaluation result: {:?}",
                    other
                )))
            }
        };

        match serde_json::from_str(&raw)
            .map_err(|e| DriverError::JavaScriptFailed(e.to_string()))?
        {
            Reply::Error { error, message } => Err(page_error(&error, message)),
            reply => Ok(reply),
        }
    }

    fn value(&self, body: &str) -> DriverResult<Value> {
        match self.evaluate(body)? {
            Reply::Null => Ok(Value::Null),
            Reply::Value { value } => Ok(value),
            other => Err(DriverError::JavaScriptFailed(format!(
                "expected a value, got {:?}",
                other
            ))),
        }
    }
}

fn page_error(kind: &str, message: String) -> DriverError {
    match kind {
        "stale" => DriverError::StaleElement(message),
        "nosuch" => DriverError::NoSuchElement(message),
        "not_interactable" => DriverError::NotInteractable(message),
        "intercepted" => DriverError::ClickIntercepted(message),
        _ => DriverError::JavaScriptFailed(message),
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn find_one(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<ElementHandle> {
        match self.evaluate(&javascript::find_one(kind, selector, root))? {
            Reply::Element { handle } => Ok(ElementHandle::new(handle)),
            other => Err(DriverError::JavaScriptFailed(format!(
                "expected an element, got {:?}",
                other
            ))),
        }
    }

    async fn find_all(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<Vec<ElementHandle>> {
        match self.evaluate(&javascript::find_all(kind, selector, root))? {
            Reply::Elements { refs } => Ok(refs.into_iter().map(ElementHandle::new).collect()),
            other => Err(DriverError::JavaScriptFailed(format!(
                "expected elements, got {:?}",
                other
            ))),
        }
    }

    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> DriverResult<ScriptValue> {
        Ok(match self.evaluate(&javascript::call(script, args))? {
            Reply::Null => ScriptValue::Null,
            Reply::Value { value } => ScriptValue::Value(value),
            Reply::Element { handle } => ScriptValue::Element(ElementHandle::new(handle)),
            Reply::Elements { refs } => {
                ScriptValue::Elements(refs.into_iter().map(ElementHandle::new).collect())
            }
            Reply::Function { arity } => ScriptValue::Function { arity },
            Reply::Error { error, message } => return Err(page_error(&error, message)),
        })
    }

    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool> {
        Ok(self
            .value(&javascript::is_visible(element))?
            .as_bool()
            .unwrap_or(false))
    }

    async fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        self.value(&javascript::click(element))?;
        Ok(())
    }

    async fn native_property(
        &self,
        element: &ElementHandle,
        property: NativeProperty,
    ) -> DriverResult<Value> {
        self.value(&javascript::native_property(element, property))
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> DriverResult<Option<String>> {
        Ok(match self.value(&javascript::attribute(element, name))? {
            Value::Null => None,
            Value::String(value) => Some(value),
            other => Some(other.to_string()),
        })
    }

    async fn screenshot(&self, element: Option<&ElementHandle>) -> DriverResult<Vec<u8>> {
        let clip = match element {
            Some(element) => {
                let rect: ElementRect = serde_json::from_value(self.value(&javascript::clip(element))?)
                    .map_err(|e| DriverError::ScreenshotFailed(e.to_string()))?;
                if rect.is_empty() {
                    return Err(DriverError::ScreenshotFailed(format!(
                        "element {} has an empty bounding box",
                        element
                    )));
                }
                Some(Page::Viewport {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    scale: 1.0,
                })
            }
            None => None,
        };

        self.tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                clip,
                true,
            )
            .map_err(|e| DriverError::ScreenshotFailed(e.to_string()))
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(|e| DriverError::NavigationFailed(e.to_string()))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| DriverError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.tab
            .close(true)
            .map_err(|e| DriverError::ChromeError(e.to_string()))?;
        info!("Closed Chrome session {}", self.session_id);
        Ok(())
    }
}

impl std::fmt::Debug for ChromeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeDriver")
            .field("session_id", &self.session_id)
            .field("url", &self.tab.get_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_errors_map_to_driver_errors() {
        let stale = page_error("stale", "element d1:0".to_string());
        assert_eq!(stale, DriverError::StaleElement("element d1:0".to_string()));
        assert!(!stale.is_absence());

        assert!(page_error("nosuch", "by-id x".to_string()).is_absence());
        assert!(page_error("intercepted", "div".to_string()).is_click_obstruction());
        assert!(matches!(
            page_error("javascript", "boom".to_string()),
            DriverError::JavaScriptFailed(_)
        ));
    }

    #[test]
    fn element_replies_keep_document_scoped_handles() {
        let reply: Reply =
            serde_json::from_str(r#"{"kind":"elements","refs":["d1:0","d1:1"]}"#).unwrap();
        let Reply::Elements { refs } = reply else {
            panic!("expected elements");
        };
        let handles: Vec<ElementHandle> = refs.into_iter().map(ElementHandle::new).collect();
        assert_eq!(handles[1].id(), "d1:1");
        assert_ne!(handles[0], ElementHandle::new("d2:0"));
    }
}
