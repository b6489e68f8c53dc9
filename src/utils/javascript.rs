//! Page-side snippets for drivers that talk to the browser by evaluating
//! JavaScript expressions.
//!
//! Every expression built here evaluates to a JSON string describing its
//! result, so a single `evaluate` round trip is enough per driver call.

use crate::core::{ElementHandle, ScriptArg, SearchRoot};
use crate::dom::SelectorKind;
use serde::Deserialize;
use serde_json::Value;

/// Element references are kept in a page-global array. Handles are
/// `<document nonce>:<index>`, so a handle from an earlier document is
/// reported stale rather than resolving to whatever took its index since.
const PRELUDE: &str = r#"
const doc = window.__unearthtime_doc || (window.__unearthtime_doc =
    (window.crypto && crypto.randomUUID) ? crypto.randomUUID() : Date.now().toString(36) + Math.random().toString(36).slice(2));
const refs = window.__unearthtime_refs || (window.__unearthtime_refs = []);
const keep = (el) => {
    let i = refs.indexOf(el);
    if (i < 0) { refs.push(el); i = refs.length - 1; }
    return doc + ':' + i;
};
const deref = (handle) => {
    const split = String(handle).lastIndexOf(':');
    const nonce = handle.slice(0, split);
    const el = split < 0 || nonce !== doc ? undefined : refs[Number(handle.slice(split + 1))];
    if (!el || !el.isConnected) { throw { unearthtime: 'stale', message: 'element ' + handle }; }
    return el;
};
const isElement = (v) => v instanceof Element;
const isList = (v) => Array.isArray(v) || v instanceof NodeList || v instanceof HTMLCollection;
const visible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
};
const encode = (v) => {
    if (v === null || v === undefined) { return { kind: 'null' }; }
    if (isElement(v)) { return { kind: 'element', ref: keep(v) }; }
    if (isList(v) && Array.from(v).every(isElement)) { return { kind: 'elements', refs: Array.from(v).map(keep) }; }
    if (typeof v === 'function') { return { kind: 'function', arity: v.length }; }
    return { kind: 'value', value: v };
};
"#;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Null,
    Value { value: Value },
    Element {
        #[serde(rename = "ref")]
        handle: String,
    },
    Elements { refs: Vec<String> },
    Function { arity: usize },
    Error { error: String, message: String },
}

/// Wrap `body`, a JavaScript expression, so that it evaluates to the JSON
/// encoding of a [`Reply`].
pub fn wrap(body: &str) -> String {
    format!(
        r#"(function() {{
{prelude}
try {{
    const result = ({body});
    return JSON.stringify(encode(result));
}} catch (e) {{
    const error = (e && e.unearthtime) || 'javascript';
    return JSON.stringify({{ kind: 'error', error: error, message: String((e && e.message) || e) }});
}}
}})()"#,
        prelude = PRELUDE,
        body = body
    )
}

pub fn literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

pub fn element(handle: &ElementHandle) -> String {
    format!("deref({})", literal(handle.id()))
}

fn root(root: &SearchRoot) -> String {
    match root {
        SearchRoot::Page => "document".to_string(),
        SearchRoot::Element(handle) => element(handle),
    }
}

pub fn find_one(kind: SelectorKind, selector: &str, search: &SearchRoot) -> String {
    let query = match kind.as_css(selector) {
        Some(css) => format!("root.querySelector({})", literal(&css)),
        None => format!(
            "document.evaluate({}, root, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            literal(selector)
        ),
    };

    format!(
        r#"(function() {{
    const root = {root};
    const found = {query};
    if (!found) {{ throw {{ unearthtime: 'nosuch', message: {description} }}; }}
    return found;
}})()"#,
        root = root(search),
        query = query,
        description = literal(&format!("{} {}", kind.display_name(), selector))
    )
}

pub fn find_all(kind: SelectorKind, selector: &str, search: &SearchRoot) -> String {
    let query = match kind.as_css(selector) {
        Some(css) => format!("Array.from(root.querySelectorAll({}))", literal(&css)),
        None => format!(
            r#"(function() {{
        const snapshot = document.evaluate({}, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        const found = [];
        for (let i = 0; i < snapshot.snapshotLength; i++) {{ found.push(snapshot.snapshotItem(i)); }}
        return found;
    }})()"#,
            literal(selector)
        ),
    };

    format!(
        "(function() {{ const root = {}; return {}; }})()",
        root(search),
        query
    )
}

pub fn call(script: &str, args: &[ScriptArg]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            ScriptArg::Element(handle) => element(handle),
            ScriptArg::Value(value) => value.to_string(),
        })
        .collect();

    format!(
        "(function() {{\n{}\n}}).apply(null, [{}])",
        script,
        args.join(", ")
    )
}

pub fn is_visible(handle: &ElementHandle) -> String {
    format!("visible({})", element(handle))
}

pub fn click(handle: &ElementHandle) -> String {
    format!(
        r#"(function(el) {{
    if (!visible(el)) {{ throw {{ unearthtime: 'not_interactable', message: el.tagName.toLowerCase() }}; }}
    el.scrollIntoView({{ block: 'center', inline: 'center' }});
    const rect = el.getBoundingClientRect();
    const top = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    if (top && top !== el && !el.contains(top)) {{
        throw {{ unearthtime: 'intercepted', message: 'other element would receive the click: ' + top.tagName.toLowerCase() }};
    }}
    el.click();
    return null;
}})({})"#,
        element(handle)
    )
}

pub fn native_property(handle: &ElementHandle, property: crate::core::NativeProperty) -> String {
    use crate::core::NativeProperty;

    let body = match property {
        NativeProperty::TagName => "el.tagName.toLowerCase()",
        NativeProperty::Text => "el.innerText",
        NativeProperty::Rect => {
            "(function(r) { return { x: r.left, y: r.top, width: r.width, height: r.height }; })(el.getBoundingClientRect())"
        }
        NativeProperty::Location => {
            "(function(r) { return { x: r.left, y: r.top }; })(el.getBoundingClientRect())"
        }
        NativeProperty::Size => {
            "(function(r) { return { width: r.width, height: r.height }; })(el.getBoundingClientRect())"
        }
        NativeProperty::Displayed => "visible(el)",
        NativeProperty::Enabled => "!el.disabled",
        NativeProperty::Selected => "!!(el.checked || el.selected)",
    };

    format!("(function(el) {{ return {}; }})({})", body, element(handle))
}

pub fn attribute(handle: &ElementHandle, name: &str) -> String {
    format!("{}.getAttribute({})", element(handle), literal(name))
}

pub fn clip(handle: &ElementHandle) -> String {
    format!(
        r#"(function(el) {{
    el.scrollIntoView({{ block: 'center', inline: 'center' }});
    const r = el.getBoundingClientRect();
    return {{ x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height }};
}})({})"#,
        element(handle)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_are_quoted() {
        assert_eq!(literal("a\"b"), r#""a\"b""#);
        assert_eq!(element(&ElementHandle::new("d1:3")), r#"deref("d1:3")"#);
    }

    #[test]
    fn queries_pick_css_or_xpath() {
        let css = find_one(SelectorKind::Id, "menu-logo", &SearchRoot::Page);
        assert!(css.contains(r#"root.querySelector("[id=\"menu-logo\"]")"#));
        assert!(css.contains("const root = document;"));

        let xpath = find_all(
            SelectorKind::XPath,
            "//label",
            &SearchRoot::Element(ElementHandle::new("d1:7")),
        );
        assert!(xpath.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        assert!(xpath.contains(r#"const root = deref("d1:7");"#));
    }

    #[test]
    fn script_arguments_are_inlined() {
        let expression = call(
            "return arguments[0];",
            &[
                ScriptArg::Element(ElementHandle::new("d1:1")),
                ScriptArg::Value(json!({"a": 1})),
            ],
        );
        assert!(expression.ends_with(r#".apply(null, [deref("d1:1"), {"a":1}])"#));
    }

    #[test]
    fn replies_parse() {
        let reply: Reply = serde_json::from_str(r#"{"kind":"element","ref":"d1:4"}"#).unwrap();
        assert_eq!(
            reply,
            Reply::Element {
                handle: "d1:4".to_string()
            }
        );

        let reply: Reply =
            serde_json::from_str(r#"{"kind":"error","error":"stale","message":"element 2"}"#)
                .unwrap();
        assert!(matches!(reply, Reply::Error { error, .. } if error == "stale"));
    }

    #[test]
    fn handles_are_scoped_to_their_document() {
        let wrapped = wrap(&attribute(&ElementHandle::new("d1:0"), "data-page"));

        assert!(wrapped.contains("window.__unearthtime_doc"));
        assert!(wrapped.contains("return doc + ':' + i;"));
        assert!(wrapped.contains("nonce !== doc ? undefined"));
        assert!(wrapped.contains("throw { unearthtime: 'stale'"));
        assert!(wrapped.contains(r#"deref("d1:0").getAttribute("data-page")"#));

        let reply: Reply = serde_json::from_str(
            r#"{"kind":"error","error":"stale","message":"element d1:0"}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            Reply::Error {
                error: "stale".to_string(),
                message: "element d1:0".to_string()
            }
        );
    }
}
