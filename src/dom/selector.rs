use crate::errors::UnearthtimeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SelectorKind {
    ClassName,
    CssSelector,
    Id,
    Name,
    TagName,
    XPath,
}

impl SelectorKind {
    pub const ALL: [SelectorKind; 6] = [
        SelectorKind::ClassName,
        SelectorKind::CssSelector,
        SelectorKind::Id,
        SelectorKind::Name,
        SelectorKind::TagName,
        SelectorKind::XPath,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            SelectorKind::ClassName => "class",
            SelectorKind::CssSelector => "css_selector",
            SelectorKind::Id => "id",
            SelectorKind::Name => "name",
            SelectorKind::TagName => "tag",
            SelectorKind::XPath => "xpath",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SelectorKind::ClassName => "by-class-name",
            SelectorKind::CssSelector => "by-css-selector",
            SelectorKind::Id => "by-id",
            SelectorKind::Name => "by-name",
            SelectorKind::TagName => "by-tag-name",
            SelectorKind::XPath => "by-xpath",
        }
    }

    pub fn label(&self) -> String {
        self.display_name()
            .trim_start_matches("by-")
            .replace('-', " ")
            .to_uppercase()
    }

    pub fn as_css(&self, selector: &str) -> Option<String> {
        match self {
            SelectorKind::CssSelector | SelectorKind::TagName => Some(selector.to_string()),
            SelectorKind::Id => Some(format!("[id=\"{}\"]", escape_css_string(selector))),
            SelectorKind::Name => Some(format!("[name=\"{}\"]", escape_css_string(selector))),
            SelectorKind::ClassName => Some(
                selector
                    .split_whitespace()
                    .map(|class| format!(".{}", escape_css_ident(class)))
                    .collect(),
            ),
            SelectorKind::XPath => None,
        }
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_css_ident(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let plain = c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
        if !plain || (i == 0 && c.is_ascii_digit()) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Default for SelectorKind {
    fn default() -> Self {
        SelectorKind::CssSelector
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for SelectorKind {
    type Err = UnearthtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        SelectorKind::ALL
            .into_iter()
            .find(|kind| kind.canonical_name() == needle || kind.display_name() == needle)
            .or(match needle.as_str() {
                "css" => Some(SelectorKind::CssSelector),
                "class_name" => Some(SelectorKind::ClassName),
                "tag_name" => Some(SelectorKind::TagName),
                _ => None,
            })
            .ok_or_else(|| UnearthtimeError::UnrecognizedSelectorKind(s.to_string()))
    }
}
