//! Built-in locators for the elements of an EarthTime page.

use crate::dom::locator::{Locator, Term};
use crate::dom::selector::SelectorKind;
use crate::utils::strings::{prefix, suffix};

pub const DISPLAYED: &str = "not([style*='display: none']):not([style*='display:none'])";

pub const XDISPLAYED: &str =
    "not(contains(@style, \"display: none\") or contains(@style, \"display:none\"))";

fn arg<'a>(args: &[&'a str], index: usize) -> &'a str {
    args.get(index).copied().unwrap_or_default()
}

fn category(id: &str) -> String {
    prefix(id, "category-")
}

fn featured(id: &str) -> String {
    suffix(&prefix(id, "category-"), "-featured")
}

fn computed<F>(description: &str, build: F) -> Term
where
    F: Fn(&[&str]) -> String + Send + Sync + 'static,
{
    Term::func(description, build)
}

fn css_candidates(terms: Vec<Term>) -> Locator {
    Locator::new(terms, SelectorKind::CssSelector)
}

pub fn builtin() -> Vec<(&'static str, Locator)> {
    vec![
        // Navigation
        ("TopNavigation", Locator::id("top-nav")),
        ("EarthTimeLogo", Locator::id("menu-logo")),
        ("StoriesMenu", Locator::id("stories-menu-choice")),
        ("DataLibraryMenu", Locator::id("layers-menu-choice")),
        ("ShareButton", Locator::id("share-menu-choice")),
        ("StoryEditorButton", Locator::id("story-editor-menu-choice")),
        ("LocationSearchIcon", Locator::id("location_search_icon")),
        ("LocationSearchInput", Locator::id("location_search")),
        ("LocationSearchClearButton", Locator::id("location_search_clear_icon")),
        // Stories
        ("StoriesMenuContainer", Locator::id("theme-menu")),
        ("StoriesMenuHeader", Locator::css("#theme-menu > label[for='theme-selection']")),
        ("ThemeMenu", Locator::css("div.themes-div")),
        (
            "ThemeHeaders",
            Locator::css("div.themes-div > h3[data-enabled='true']").list(),
        ),
        (
            "ThemeTables",
            Locator::css("div.themes-div > table[data-enabled='true']").list(),
        ),
        (
            "ThemeHeader",
            css_candidates(vec![
                Term::template("h3#{}"),
                computed("div.themes-div > h3[aria-controls='theme_<id>']", |args| {
                    format!(
                        "div.themes-div > h3[aria-controls='{}']",
                        prefix(arg(args, 0), "theme_")
                    )
                }),
            ]),
        ),
        (
            "ThemeTable",
            css_candidates(vec![
                computed("table#theme_<id>", |args| {
                    format!("table#{}", prefix(arg(args, 0), "theme_"))
                }),
                Term::template("div.themes-div > table[aria-labelledby='{}']"),
            ]),
        ),
        (
            "ThemeStories",
            css_candidates(vec![
                computed("table#theme_<id> tr:not(:first-child)", |args| {
                    format!("table#{}  tr:not(:first-child)", prefix(arg(args, 0), "theme_"))
                }),
                Term::template("div.themes-div > table[aria-labelledby='{}']  tr:not(:first-child)"),
            ])
            .list(),
        ),
        (
            "StoryTitle",
            Locator::new(
                computed("#story_<id> > td:nth-child(3)", |args| {
                    format!("#{} > td:nth-child(3)", prefix(arg(args, 0), "story_"))
                }),
                SelectorKind::CssSelector,
            ),
        ),
        (
            "StoryRadioButton",
            Locator::new(
                computed("#story_<id> input", |args| {
                    format!("#{} input", prefix(arg(args, 0), "story_"))
                }),
                SelectorKind::CssSelector,
            ),
        ),
        // Data library
        ("DataLibraryMenuContainer", Locator::id("layers-menu")),
        ("DataLibraryMenuHeader", Locator::css("#layers-menu > label[for='layer-selection']")),
        ("DataLibrarySearchContainer", Locator::id("search-content")),
        ("DataLibrarySearchInput", Locator::id("layer-search-box")),
        ("DataLibrarySearchClearButton", Locator::id("layer-search-clear-icon")),
        ("DataLibraryClearActiveLayersButton", Locator::css("div.clearLayers")),
        (
            "DataLibraryEmptySearchResultsMessage",
            Locator::id("layer-search-results-empty-msg"),
        ),
        ("DataLibrarySearchResultsContainer", Locator::id("layer-search-results")),
        (
            "DataLibrarySearchFoundLabels",
            Locator::css(format!("#layer-search-results > label:{}", DISPLAYED)).list(),
        ),
        (
            "DataLibrarySearchFoundLabelsAfter",
            Locator::new(
                computed("labels after category <name>", |args| {
                    format!(
                        "//*[@id=\"layer-search-results\"]/label[preceding-sibling::div[text()=\"{}\"] and {}]",
                        arg(args, 0),
                        XDISPLAYED
                    )
                }),
                SelectorKind::XPath,
            )
            .list(),
        ),
        // Categories
        (
            "CategoryMenu",
            css_candidates(vec![
                Term::literal(format!("div.map-layer-div:{}", DISPLAYED)),
                Term::literal("div#featured-layers"),
            ]),
        ),
        (
            "CategoryHeaders",
            css_candidates(vec![
                Term::literal(format!(
                    "div.map-layer-div:{0} > h3:{0}:not([aria-controls='category-base-layers'])",
                    DISPLAYED
                )),
                Term::literal(format!(
                    "div#featured-layers > h3:{}:not([aria-controls='category-base-layers'])",
                    DISPLAYED
                )),
            ])
            .list(),
        ),
        (
            "CategoryHeader",
            css_candidates(vec![
                Term::template("h3#{}"),
                computed("h3[aria-controls='category-<id>']", |args| {
                    format!("h3[aria-controls='{}']", category(arg(args, 0)))
                }),
                computed("h3[aria-controls='category-<id>-featured']", |args| {
                    format!("h3[aria-controls='{}']", featured(arg(args, 0)))
                }),
            ]),
        ),
        (
            "CategoryTable",
            css_candidates(vec![
                computed("table#category-<id>", |args| {
                    format!("table#{}", category(arg(args, 0)))
                }),
                computed("table#category-<id>-featured", |args| {
                    format!("table#{}", featured(arg(args, 0)))
                }),
                Term::template("table[aria-labelledby='{}']"),
            ]),
        ),
        (
            "CategoryLabels",
            css_candidates(vec![
                computed("table#category-<id> tr > td > label", |args| {
                    format!("table#{}  tr > td > label", category(arg(args, 0)))
                }),
                computed("table#category-<id>-featured tr > td > label", |args| {
                    format!("table#{}  tr > td > label", featured(arg(args, 0)))
                }),
                Term::template("table[aria-labelledby='{}'] tr > td > label"),
            ])
            .list(),
        ),
        ("BaseLayersHeader", Locator::id("category-base-layers")),
        (
            "FeaturedLayersShowMoreButton",
            Locator::css("div#show-more-layers:not([class='active'])"),
        ),
        // Layers
        (
            "LayerLabel",
            Locator::new(Term::template("{}"), SelectorKind::Name),
        ),
        (
            "LayerCheckbox",
            Locator::new(Term::template("//label[@name=\"{}\"]/input"), SelectorKind::XPath),
        ),
        (
            "LayerInfo",
            Locator::new(Term::template("//label[@name=\"{}\"]/../../td"), SelectorKind::XPath).list(),
        ),
        (
            "CheckedLayerCheckboxes",
            css_candidates(vec![
                Term::literal(format!(
                    "div.map-layer-div:{} > table:not([id='category-base-layers']) label > input:checked",
                    DISPLAYED
                )),
                Term::literal(
                    "div#featured-layers > table:not([id='category-base-layers']) label > input:checked",
                ),
            ])
            .list(),
        ),
        // Share view
        ("ShareViewContainer", Locator::css("div.shareView")),
        ("ShareViewCloseButton", Locator::css("button.close-share")),
        ("ShareAsLinkInput", Locator::css("table.share-link input.shareurl")),
        ("ShareAsImageOrVideoOutputDimensionsWidth", Locator::id("thumbnail-width")),
        ("ShareAsImageOrVideoOutputDimensionsHeight", Locator::id("thumbnail-height")),
        // Map controls
        ("ZoomInButton", Locator::css("button.zoomin")),
        ("ZoomOutButton", Locator::css("button.zoomout")),
        ("LegendContainer", Locator::id("layers-legend")),
        (
            "Legend",
            Locator::css(format!("#legend-content > table > tbody > tr:{}", DISPLAYED)),
        ),
        ("ScaleBarContainer", Locator::id("scaleBar1_scaleBarContainer")),
        ("AnnotationInfo", Locator::css("div.current-location-text")),
        ("NextAnnotationButton", Locator::css("div.next-annotation-location")),
        ("PreviousAnnotationButton", Locator::css("div.previous-annotation-location")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_and_pairs_are_consistent() {
        let catalog = builtin();
        let names: HashSet<&str> = catalog.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), catalog.len());

        for (name, locator) in catalog.iter() {
            assert!(locator.pairs().is_ok(), "{} has mismatched pairs", name);
        }
    }

    #[test]
    fn parameterized_entries_build_selectors() {
        let catalog = builtin();
        let get = |name: &str| {
            catalog
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, l)| l.clone())
                .unwrap()
        };

        let header = get("CategoryHeader");
        let selectors: Vec<String> = header
            .pairs()
            .unwrap()
            .into_iter()
            .map(|(term, _)| term.resolve(&["co2"]))
            .collect();
        assert_eq!(
            selectors,
            [
                "h3#co2",
                "h3[aria-controls='category-co2']",
                "h3[aria-controls='category-co2-featured']"
            ]
        );

        let checkbox = get("LayerCheckbox");
        assert!(checkbox.is_parameterized());
        assert_eq!(
            checkbox.pairs().unwrap()[0].0.resolve(&["Fires"]),
            "//label[@name=\"Fires\"]/input"
        );

        assert!(!get("EarthTimeLogo").is_parameterized());
        assert!(get("ThemeHeaders").is_list());
    }
}
