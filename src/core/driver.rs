use crate::dom::SelectorKind;
use crate::errors::DriverResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Opaque reference to an element owned by a driver.
///
/// Two handles are equal when they refer to the same underlying element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    Page,
    Element(ElementHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Element(ElementHandle),
    Value(Value),
}

impl From<&ElementHandle> for ScriptArg {
    fn from(handle: &ElementHandle) -> Self {
        ScriptArg::Element(handle.clone())
    }
}

impl From<Value> for ScriptArg {
    fn from(value: Value) -> Self {
        ScriptArg::Value(value)
    }
}

impl From<&str> for ScriptArg {
    fn from(value: &str) -> Self {
        ScriptArg::Value(Value::String(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Value(Value),
    Element(ElementHandle),
    Elements(Vec<ElementHandle>),
    Function { arity: usize },
}

impl ScriptValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Value(value) => value.as_str(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Value(value) => value.as_bool(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeProperty {
    TagName,
    Text,
    Rect,
    Location,
    Size,
    Displayed,
    Enabled,
    Selected,
}

impl NativeProperty {
    pub const ALL: [NativeProperty; 8] = [
        NativeProperty::TagName,
        NativeProperty::Text,
        NativeProperty::Rect,
        NativeProperty::Location,
        NativeProperty::Size,
        NativeProperty::Displayed,
        NativeProperty::Enabled,
        NativeProperty::Selected,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NativeProperty::TagName => "tag_name",
            NativeProperty::Text => "text",
            NativeProperty::Rect => "rect",
            NativeProperty::Location => "location",
            NativeProperty::Size => "size",
            NativeProperty::Displayed => "displayed",
            NativeProperty::Enabled => "enabled",
            NativeProperty::Selected => "selected",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// The capabilities the locator layer needs from a browser automation driver.
#[async_trait]
pub trait Driver: Send + Sync {
    fn session_id(&self) -> &str;

    async fn find_one(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<ElementHandle>;

    async fn find_all(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<Vec<ElementHandle>>;

    /// Run `script` as a function body; `arguments[i]` is `args[i]`.
    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> DriverResult<ScriptValue>;

    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool>;

    async fn click(&self, element: &ElementHandle) -> DriverResult<()>;

    async fn native_property(
        &self,
        element: &ElementHandle,
        property: NativeProperty,
    ) -> DriverResult<Value>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> DriverResult<Option<String>>;

    async fn screenshot(&self, element: Option<&ElementHandle>) -> DriverResult<Vec<u8>>;

    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}
