//! In-memory [`Driver`] for exercising locators without a browser.

use crate::core::{Driver, ElementHandle, NativeProperty, ScriptArg, ScriptValue, SearchRoot};
use crate::dom::hit::scripts;
use crate::dom::SelectorKind;
use crate::errors::{DriverError, DriverResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

type SelectorKey = (Option<String>, SelectorKind, String);

#[derive(Debug, Clone)]
struct StubElement {
    display: String,
    visible: bool,
    tag: String,
    text: String,
    attributes: HashMap<String, String>,
    properties: HashMap<String, ScriptValue>,
    obstructed_clicks: usize,
    native_clicks: usize,
    script_clicks: usize,
}

impl Default for StubElement {
    fn default() -> Self {
        Self {
            display: String::new(),
            visible: true,
            tag: "div".to_string(),
            text: String::new(),
            attributes: HashMap::new(),
            properties: HashMap::new(),
            obstructed_clicks: 0,
            native_clicks: 0,
            script_clicks: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Matches {
    ids: Vec<String>,
    misses_before: usize,
    error: Option<DriverError>,
}

#[derive(Debug, Default)]
struct StubState {
    elements: HashMap<String, StubElement>,
    selectors: HashMap<SelectorKey, Matches>,
    find_calls: HashMap<SelectorKey, usize>,
    scripts: HashMap<String, usize>,
    script_args: HashMap<String, Vec<Vec<ScriptArg>>>,
    script_results: HashMap<String, ScriptValue>,
    failing_scripts: HashSet<String>,
    navigations: Vec<String>,
    closed: bool,
}

impl StubState {
    fn element(&mut self, id: &str) -> &mut StubElement {
        self.elements.entry(id.to_string()).or_default()
    }
}

/// A scriptable driver: elements are registered per selector, and every
/// lookup, script and click is counted.
///
/// Unregistered selectors are not found. Unregistered element ids behave as
/// visible `div`s without attributes.
#[derive(Debug)]
pub struct StubDriver {
    session_id: String,
    state: Mutex<StubState>,
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StubDriver {
    pub fn new() -> Self {
        Self {
            session_id: "stub-session".to_string(),
            state: Mutex::new(StubState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_element(self, kind: SelectorKind, selector: &str, id: &str) -> Self {
        self.with_elements(kind, selector, &[id])
    }

    pub fn with_elements(self, kind: SelectorKind, selector: &str, ids: &[&str]) -> Self {
        self.register(None, kind, selector, ids, 0)
    }

    pub fn with_element_after(self, kind: SelectorKind, selector: &str, id: &str, lookup: usize) -> Self {
        self.register(None, kind, selector, &[id], lookup.saturating_sub(1))
    }

    pub fn with_child(self, parent: &str, kind: SelectorKind, selector: &str, id: &str) -> Self {
        self.register(Some(parent), kind, selector, &[id], 0)
    }

    pub fn with_find_error(self, kind: SelectorKind, selector: &str, error: DriverError) -> Self {
        self.state()
            .selectors
            .entry((None, kind, selector.to_string()))
            .or_default()
            .error = Some(error);
        self
    }

    pub fn with_display(self, id: &str, display: &str) -> Self {
        self.set_display(id, display);
        self
    }

    pub fn with_hidden(self, id: &str) -> Self {
        self.hide(id);
        self
    }

    pub fn with_tag(self, id: &str, tag: &str) -> Self {
        self.state().element(id).tag = tag.to_string();
        self
    }

    pub fn with_text(self, id: &str, text: &str) -> Self {
        self.state().element(id).text = text.to_string();
        self
    }

    pub fn with_attribute(self, id: &str, name: &str, value: &str) -> Self {
        self.state()
            .element(id)
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_property(self, id: &str, name: &str, value: ScriptValue) -> Self {
        self.state()
            .element(id)
            .properties
            .insert(name.to_string(), value);
        self
    }

    pub fn with_obstructed_clicks(self, id: &str, count: usize) -> Self {
        self.state().element(id).obstructed_clicks = count;
        self
    }

    pub fn with_failing_script(self, script: &str) -> Self {
        self.state().failing_scripts.insert(script.to_string());
        self
    }

    pub fn with_script_result(self, script: &str, value: ScriptValue) -> Self {
        self.state()
            .script_results
            .insert(script.to_string(), value);
        self
    }

    fn register(
        self,
        parent: Option<&str>,
        kind: SelectorKind,
        selector: &str,
        ids: &[&str],
        misses_before: usize,
    ) -> Self {
        {
            let mut state = self.state();
            for id in ids {
                state.element(id);
            }
            state.selectors.insert(
                (parent.map(str::to_string), kind, selector.to_string()),
                Matches {
                    ids: ids.iter().map(|id| id.to_string()).collect(),
                    misses_before,
                    error: None,
                },
            );
        }
        self
    }

    pub fn hide(&self, id: &str) {
        self.state().element(id).visible = false;
    }

    pub fn show(&self, id: &str) {
        self.state().element(id).visible = true;
    }

    pub fn set_display(&self, id: &str, display: &str) {
        self.state().element(id).display = display.to_string();
    }

    pub fn display(&self, id: &str) -> String {
        self.state().element(id).display.clone()
    }

    pub fn find_calls(&self) -> usize {
        self.state().find_calls.values().sum()
    }

    pub fn find_calls_for(&self, kind: SelectorKind, selector: &str) -> usize {
        self.state()
            .find_calls
            .iter()
            .filter(|((_, k, s), _)| *k == kind && s == selector)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn script_count(&self, script: &str) -> usize {
        self.state().scripts.get(script).copied().unwrap_or_default()
    }

    pub fn script_args(&self, script: &str) -> Vec<Vec<ScriptArg>> {
        self.state()
            .script_args
            .get(script)
            .cloned()
            .unwrap_or_default()
    }

    pub fn native_clicks(&self, id: &str) -> usize {
        self.state().element(id).native_clicks
    }

    pub fn script_clicks(&self, id: &str) -> usize {
        self.state().element(id).script_clicks
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn lookup(&self, kind: SelectorKind, selector: &str, root: &SearchRoot) -> DriverResult<Vec<String>> {
        let parent = match root {
            SearchRoot::Page => None,
            SearchRoot::Element(handle) => Some(handle.id().to_string()),
        };
        let key = (parent, kind, selector.to_string());

        let mut state = self.state();
        let calls = state.find_calls.entry(key.clone()).or_default();
        *calls += 1;
        let calls = *calls;

        let not_found = || DriverError::NoSuchElement(format!("{} {}", kind.display_name(), selector));
        let matches = state.selectors.get(&key).ok_or_else(not_found)?;
        if let Some(error) = &matches.error {
            return Err(error.clone());
        }
        if calls <= matches.misses_before {
            return Err(not_found());
        }
        Ok(matches.ids.clone())
    }
}

fn element_arg(args: &[ScriptArg]) -> Option<&str> {
    match args.first() {
        Some(ScriptArg::Element(handle)) => Some(handle.id()),
        _ => None,
    }
}

fn string_arg(args: &[ScriptArg], index: usize) -> String {
    match args.get(index) {
        Some(ScriptArg::Value(Value::String(s))) => s.clone(),
        _ => String::new(),
    }
}

#[async_trait]
impl Driver for StubDriver {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn find_one(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<ElementHandle> {
        self.lookup(kind, selector, root)?
            .into_iter()
            .next()
            .map(ElementHandle::new)
            .ok_or_else(|| DriverError::NoSuchElement(selector.to_string()))
    }

    async fn find_all(
        &self,
        kind: SelectorKind,
        selector: &str,
        root: &SearchRoot,
    ) -> DriverResult<Vec<ElementHandle>> {
        Ok(self
            .lookup(kind, selector, root)?
            .into_iter()
            .map(ElementHandle::new)
            .collect())
    }

    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> DriverResult<ScriptValue> {
        let mut state = self.state();
        *state.scripts.entry(script.to_string()).or_default() += 1;
        state
            .script_args
            .entry(script.to_string())
            .or_default()
            .push(args.to_vec());

        if state.failing_scripts.contains(script) {
            return Err(DriverError::JavaScriptFailed(script.to_string()));
        }

        let target = element_arg(args).map(str::to_string);
        let result = match (script, target) {
            (scripts::INLINE_DISPLAY, Some(id)) => {
                ScriptValue::Value(Value::String(state.element(&id).display.clone()))
            }
            (scripts::SET_DISPLAY, Some(id)) => {
                state.element(&id).display = string_arg(args, 1);
                ScriptValue::Null
            }
            (scripts::SCROLL_AND_CLICK, Some(id)) => {
                state.element(&id).script_clicks += 1;
                ScriptValue::Null
            }
            (scripts::PROPERTY, Some(id)) => state
                .element(&id)
                .properties
                .get(&string_arg(args, 1))
                .cloned()
                .unwrap_or(ScriptValue::Null),
            _ => state
                .script_results
                .get(script)
                .cloned()
                .unwrap_or(ScriptValue::Null),
        };
        Ok(result)
    }

    async fn is_visible(&self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.state();
        let element = state.element(element.id());
        Ok(element.visible && element.display != "none")
    }

    async fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.state();
        let stub = state.element(element.id());
        stub.native_clicks += 1;
        if stub.obstructed_clicks > 0 {
            stub.obstructed_clicks -= 1;
            return Err(DriverError::ClickIntercepted(element.id().to_string()));
        }
        Ok(())
    }

    async fn native_property(
        &self,
        element: &ElementHandle,
        property: NativeProperty,
    ) -> DriverResult<Value> {
        let mut state = self.state();
        let stub = state.element(element.id());
        let displayed = stub.visible && stub.display != "none";
        Ok(match property {
            NativeProperty::TagName => json!(stub.tag),
            NativeProperty::Text => json!(stub.text),
            NativeProperty::Rect => json!({"x": 0, "y": 0, "width": 100, "height": 20}),
            NativeProperty::Location => json!({"x": 0, "y": 0}),
            NativeProperty::Size => json!({"width": 100, "height": 20}),
            NativeProperty::Displayed => json!(displayed),
            NativeProperty::Enabled => json!(true),
            NativeProperty::Selected => json!(false),
        })
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> DriverResult<Option<String>> {
        Ok(self.state().element(element.id()).attributes.get(name).cloned())
    }

    async fn screenshot(&self, element: Option<&ElementHandle>) -> DriverResult<Vec<u8>> {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(element.map(ElementHandle::id).unwrap_or("page").as_bytes());
        Ok(png)
    }

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.state().navigations.push(url.to_string());
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.state().closed = true;
        Ok(())
    }
}

pub fn stub_driver(stub: StubDriver) -> (Arc<StubDriver>, Arc<dyn Driver>) {
    let stub = Arc::new(stub);
    let driver: Arc<dyn Driver> = stub.clone();
    (stub, driver)
}
