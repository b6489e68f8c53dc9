use crate::core::{Driver, ElementHandle, NativeProperty, ScriptArg, ScriptValue};
use crate::dom::response::{HitList, Response};
use crate::dom::wait::Condition;
use crate::errors::{Result, UnearthtimeError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod scripts {
    pub const INLINE_DISPLAY: &str = "return arguments[0].style.display;";
    pub const SET_DISPLAY: &str = "arguments[0].style.display = arguments[1];";
    pub const SCROLL_AND_CLICK: &str = "arguments[0].scrollIntoView(); arguments[0].click();";
    pub const PROPERTY: &str = "return arguments[0][arguments[1]];";
    pub const INVOKE: &str =
        "const target = arguments[0]; return target[arguments[1]].apply(target, arguments[2]);";
}

#[derive(Clone)]
pub struct Hit {
    driver: Arc<dyn Driver>,
    handle: ElementHandle,
    display: String,
}

impl Hit {
    pub async fn capture(driver: Arc<dyn Driver>, handle: ElementHandle) -> Result<Self> {
        let display = inline_display(driver.as_ref(), &handle).await?;
        Ok(Self {
            driver,
            handle,
            display,
        })
    }

    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn session_id(&self) -> &str {
        self.driver.session_id()
    }

    pub fn captured_display(&self) -> &str {
        &self.display
    }

    pub async fn is_visible(&self) -> Result<bool> {
        Ok(self.driver.is_visible(&self.handle).await?)
    }

    /// Click the element. An obstructed click is retried once by scrolling the
    /// element into view and clicking from script; a second failure propagates.
    /// A non-zero `settle` is awaited after a successful click.
    pub async fn click(&self, settle: Duration) -> Result<()> {
        match self.driver.click(&self.handle).await {
            Ok(()) => {}
            Err(e) if e.is_click_obstruction() => {
                warn!(element = %self.handle, error = %e, "click obstructed, retrying from script");
                self.driver
                    .run_script(scripts::SCROLL_AND_CLICK, &[self.arg()])
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(())
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.driver.attribute(&self.handle, name).await?)
    }

    pub async fn native(&self, property: NativeProperty) -> Result<Value> {
        Ok(self.driver.native_property(&self.handle, property).await?)
    }

    pub async fn text(&self) -> Result<String> {
        Ok(self
            .native(NativeProperty::Text)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    pub async fn tag_name(&self) -> Result<String> {
        Ok(self
            .native(NativeProperty::TagName)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Look `name` up in three stages, first match wins:
    ///
    /// 1. a [`NativeProperty`] of the element (`tag_name`, `text`, `rect`, ...)
    /// 2. an HTML attribute
    /// 3. a DOM/JS property read by script. Element results are wrapped in a
    ///    new `Hit`, functions become a [`PageFunction`] of matching arity.
    ///
    /// Fails with `InvalidAttribute` when no stage yields a value.
    pub async fn property(&self, name: &str) -> Result<Property> {
        if let Some(native) = NativeProperty::from_name(name) {
            return Ok(Property::Native(self.native(native).await?));
        }

        if let Some(value) = self.attribute(name).await? {
            return Ok(Property::Attribute(value));
        }

        let value = self
            .driver
            .run_script(scripts::PROPERTY, &[self.arg(), ScriptArg::from(name)])
            .await?;

        match value {
            ScriptValue::Null => Err(UnearthtimeError::InvalidAttribute(name.to_string())),
            ScriptValue::Value(value) => Ok(Property::Value(value)),
            ScriptValue::Element(handle) => Ok(Property::Element(
                Hit::capture(self.driver.clone(), handle).await?,
            )),
            ScriptValue::Elements(handles) => Ok(Property::Elements(
                HitList::capture(&self.driver, handles).await?,
            )),
            ScriptValue::Function { arity } => Ok(Property::Function(PageFunction {
                driver: self.driver.clone(),
                receiver: Receiver::Element(self.handle.clone()),
                name: name.to_string(),
                arity,
            })),
        }
    }

    pub async fn invoke(&self, name: &str, args: &[Value]) -> Result<ScriptValue> {
        Ok(self
            .driver
            .run_script(
                scripts::INVOKE,
                &[
                    self.arg(),
                    ScriptArg::from(name),
                    ScriptArg::Value(Value::Array(args.to_vec())),
                ],
            )
            .await?)
    }

    pub async fn hide(&self) -> Result<()> {
        if inline_display(self.driver.as_ref(), &self.handle).await? == "none" {
            return Ok(());
        }
        self.set_display("none").await
    }

    pub async fn reset_display(&self) -> Result<()> {
        if inline_display(self.driver.as_ref(), &self.handle).await? == self.display {
            return Ok(());
        }
        self.set_display(&self.display).await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.driver.screenshot(Some(&self.handle)).await?)
    }

    pub async fn screenshot_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.screenshot().await?))
    }

    pub async fn verify(&self, condition: &Condition) -> Result<bool> {
        condition.test(&Response::Hit(self.clone())).await
    }

    pub async fn when(self, condition: &Condition) -> Result<Response> {
        let response = Response::Hit(self);
        if condition.test(&response).await? {
            Ok(response)
        } else {
            Ok(Response::Miss)
        }
    }

    fn arg(&self) -> ScriptArg {
        ScriptArg::Element(self.handle.clone())
    }

    async fn set_display(&self, value: &str) -> Result<()> {
        debug!(element = %self.handle, display = %value, "setting inline display");
        self.driver
            .run_script(scripts::SET_DISPLAY, &[self.arg(), ScriptArg::from(value)])
            .await?;
        Ok(())
    }
}

async fn inline_display(driver: &dyn Driver, handle: &ElementHandle) -> Result<String> {
    let display = driver
        .run_script(scripts::INLINE_DISPLAY, &[ScriptArg::Element(handle.clone())])
        .await?;
    Ok(display.as_str().unwrap_or_default().to_string())
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.session_id() == other.session_id()
    }
}

impl Eq for Hit {}

impl Hash for Hit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.session_id().hash(state);
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hit[{}]", self.handle)
    }
}

impl fmt::Debug for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hit")
            .field("handle", &self.handle)
            .field("display", &self.display)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Property {
    Native(Value),
    Attribute(String),
    Value(Value),
    Element(Hit),
    Elements(HitList),
    Function(PageFunction),
}

#[derive(Debug, Clone)]
enum Receiver {
    Element(ElementHandle),
    Global(String),
}

#[derive(Clone)]
pub struct PageFunction {
    driver: Arc<dyn Driver>,
    receiver: Receiver,
    name: String,
    arity: usize,
}

impl PageFunction {
    pub(crate) fn global(
        driver: Arc<dyn Driver>,
        object: impl Into<String>,
        name: impl Into<String>,
        arity: usize,
    ) -> Self {
        Self {
            driver,
            receiver: Receiver::Global(object.into()),
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub async fn call(&self, args: &[Value]) -> Result<ScriptValue> {
        if args.len() != self.arity {
            return Err(UnearthtimeError::ArityMismatch {
                name: self.name.clone(),
                expected: self.arity,
                given: args.len(),
            });
        }

        let packed = ScriptArg::Value(Value::Array(args.to_vec()));
        let value = match &self.receiver {
            Receiver::Element(handle) => {
                self.driver
                    .run_script(
                        scripts::INVOKE,
                        &[
                            ScriptArg::Element(handle.clone()),
                            ScriptArg::from(self.name.as_str()),
                            packed,
                        ],
                    )
                    .await?
            }
            Receiver::Global(object) => {
                let script = format!(
                    "const target = {}; return target[arguments[0]].apply(target, arguments[1]);",
                    object
                );
                self.driver
                    .run_script(&script, &[ScriptArg::from(self.name.as_str()), packed])
                    .await?
            }
        };
        Ok(value)
    }
}

impl fmt::Debug for PageFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFunction")
            .field("receiver", &self.receiver)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}
