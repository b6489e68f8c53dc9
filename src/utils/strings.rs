use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-\s]+").unwrap());

pub fn prefix(value: &str, pre: &str) -> String {
    if value.starts_with(pre) {
        value.to_string()
    } else {
        format!("{}{}", pre, value)
    }
}

pub fn suffix(value: &str, suf: &str) -> String {
    if value.ends_with(suf) {
        value.to_string()
    } else {
        format!("{}{}", value, suf)
    }
}

pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Registry name for a loosely written one:
/// `"data library menu"`, `"data_library-menu"` -> `"DataLibraryMenu"`.
pub fn resolve_query(value: &str) -> String {
    SEPARATORS
        .split(value.trim())
        .filter(|word| !word.is_empty())
        .map(capitalize_first)
        .collect()
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_suffix_are_idempotent() {
        assert_eq!(prefix("co2", "category-"), "category-co2");
        assert_eq!(prefix("category-co2", "category-"), "category-co2");
        assert_eq!(suffix("category-co2", "-featured"), "category-co2-featured");
        assert_eq!(
            suffix(&prefix("co2-featured", "category-"), "-featured"),
            "category-co2-featured"
        );
    }

    #[test]
    fn resolves_loose_names() {
        assert_eq!(resolve_query("data library menu"), "DataLibraryMenu");
        assert_eq!(resolve_query("  earth_time-logo "), "EarthTimeLogo");
        assert_eq!(resolve_query("TopNavigation"), "TopNavigation");
        assert_eq!(resolve_query(""), "");
    }

    #[test]
    fn capitalize() {
        assert_eq!(capitalize_first("zoom"), "Zoom");
        assert_eq!(capitalize_first("z"), "Z");
        assert_eq!(capitalize_first(""), "");
        assert!(is_blank("  \t"));
    }
}
