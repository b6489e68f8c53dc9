use crate::dom::locator::Locator;
use crate::utils::strings::is_blank;
use std::collections::BTreeMap;
use tracing::debug;

pub type Layer = BTreeMap<String, Locator>;

/// Layered name -> locator namespace.
///
/// Layers are ordered front (index 0, highest precedence) to back. A lookup
/// returns the entry from the first layer that defines the name, so a name
/// registered at the front shadows deeper definitions without removing them.
/// There is always at least one layer.
#[derive(Debug, Clone)]
pub struct Registry {
    layers: Vec<Layer>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            layers: vec![Layer::new()],
        }
    }

    pub fn with_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Locator)>,
    {
        let mut registry = Self::new();
        registry.layers[0] = valid_layer(entries);
        registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Option<&Locator> {
        self.first_for(name)
    }

    pub fn first_for(&self, name: &str) -> Option<&Locator> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    pub fn last_for(&self, name: &str) -> Option<&Locator> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    pub fn all_for(&self, name: &str) -> Vec<&Locator> {
        self.layers.iter().filter_map(|layer| layer.get(name)).collect()
    }

    /// Add `entries` as a new front layer. Blank names are skipped; nothing is
    /// added when no entry is left.
    pub fn register_front<K, I>(&mut self, entries: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Locator)>,
    {
        let layer = valid_layer(entries);
        if !layer.is_empty() {
            debug!(entries = layer.len(), "registering front layer");
            self.layers.insert(0, layer);
        }
    }

    pub fn register_back<K, I>(&mut self, entries: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Locator)>,
    {
        let layer = valid_layer(entries);
        if !layer.is_empty() {
            debug!(entries = layer.len(), "registering back layer");
            self.layers.push(layer);
        }
    }

    pub fn set(&mut self, name: impl Into<String>, locator: Locator) {
        if self.layers.is_empty() {
            self.layers.push(Layer::new());
        }
        self.layers[0].insert(name.into(), locator);
    }

    pub fn delete_first(&mut self, name: &str) -> Option<Locator> {
        self.layers.iter_mut().find_map(|layer| layer.remove(name))
    }

    pub fn delete_all(&mut self, name: &str) -> Vec<Locator> {
        self.layers.iter_mut().filter_map(|layer| layer.remove(name)).collect()
    }

    pub fn delete_in(&mut self, layer: usize, name: &str) -> Option<Locator> {
        self.layers.get_mut(layer).and_then(|layer| layer.remove(name))
    }

    pub fn overwrite(&mut self, name: &str, locator: Locator) -> bool {
        match self.layers.iter_mut().find_map(|layer| layer.get_mut(name)) {
            Some(slot) => {
                *slot = locator;
                true
            }
            None => false,
        }
    }

    /// Shadow `name` with `locator`.
    ///
    /// When the front layer doesn't define `name`, a new front layer holding
    /// only this entry is pushed, leaving any deeper definition in place.
    /// When it does, the front entry is replaced.
    pub fn update(&mut self, name: impl Into<String>, locator: Locator) {
        let name = name.into();
        match self.layers.first_mut() {
            Some(front) if front.contains_key(&name) => {
                front.insert(name, locator);
            }
            _ => {
                debug!(name = %name, "shadowing with new front layer");
                self.layers.insert(0, Layer::from([(name, locator)]));
            }
        }
    }

    pub fn compact(&mut self) {
        self.layers.retain(|layer| !layer.is_empty());
        if self.layers.is_empty() {
            self.layers.push(Layer::new());
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.merged().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Layer::is_empty)
    }

    pub fn search(&self, pattern: &str) -> Vec<&str> {
        self.merged()
            .into_keys()
            .filter(|name| name.contains(pattern))
            .collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Locator)> {
        self.merged().into_iter()
    }

    fn merged(&self) -> BTreeMap<&str, &Locator> {
        let mut merged = BTreeMap::new();
        for layer in self.layers.iter() {
            for (name, locator) in layer {
                merged.entry(name.as_str()).or_insert(locator);
            }
        }
        merged
    }
}

fn valid_layer<K, I>(entries: I) -> Layer
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Locator)>,
{
    entries
        .into_iter()
        .map(|(name, locator)| (name.into(), locator))
        .filter(|(name, _)| !is_blank(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(selector: &str) -> Locator {
        Locator::id(selector)
    }

    #[test]
    fn front_registration_shadows_and_delete_first_uncovers() {
        let mut registry = Registry::new();
        registry.register_front([("X", l("one"))]);
        registry.register_front([("X", l("two"))]);

        assert_eq!(registry.get("X"), Some(&l("two")));
        assert_eq!(registry.all_for("X"), vec![&l("two"), &l("one")]);

        assert_eq!(registry.delete_first("X"), Some(l("two")));
        assert_eq!(registry.get("X"), Some(&l("one")));
    }

    #[test]
    fn back_registration_never_shadows() {
        let mut registry = Registry::with_entries([("Logo", l("menu-logo"))]);
        registry.register_back([("Logo", l("other")), ("Nav", l("top-nav"))]);

        assert_eq!(registry.get("Logo"), Some(&l("menu-logo")));
        assert_eq!(registry.last_for("Logo"), Some(&l("other")));
        assert_eq!(registry.get("Nav"), Some(&l("top-nav")));
    }

    #[test]
    fn absent_names_are_none() {
        let registry = Registry::new();
        assert!(!registry.contains("Nope"));
        assert!(registry.get("Nope").is_none());
        assert!(registry.first_for("Nope").is_none());
        assert!(registry.all_for("Nope").is_empty());
    }

    #[test]
    fn blank_names_are_skipped() {
        let mut registry = Registry::new();
        registry.register_front([("", l("a")), ("  ", l("b")), ("\t\n", l("c"))]);
        assert_eq!(registry.layers().len(), 1);

        registry.register_back([(" ", l("a"))]);
        assert_eq!(registry.layers().len(), 1);

        registry.register_front([("", l("a")), ("Ok", l("b"))]);
        assert_eq!(registry.layers().len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn update_shadows_deeper_entry() {
        let mut registry = Registry::with_entries([("X", l("deep")), ("Y", l("y"))]);
        registry.register_front([("Z", l("z"))]);

        registry.update("X", l("shallow"));

        assert_eq!(registry.layers().len(), 3);
        assert_eq!(registry.layers()[0].len(), 1);
        assert_eq!(registry.get("X"), Some(&l("shallow")));
        assert_eq!(registry.layers()[2].get("X"), Some(&l("deep")));
        assert_eq!(registry.layers()[1].get("Z"), Some(&l("z")));
    }

    #[test]
    fn update_replaces_front_entry_in_place() {
        let mut registry = Registry::with_entries([("X", l("old"))]);
        registry.update("X", l("new"));

        assert_eq!(registry.layers().len(), 1);
        assert_eq!(registry.get("X"), Some(&l("new")));
    }

    #[test]
    fn overwrite_hits_first_definition_only() {
        let mut registry = Registry::with_entries([("X", l("deep"))]);
        registry.register_front([("X", l("front"))]);

        assert!(registry.overwrite("X", l("patched")));
        assert_eq!(registry.all_for("X"), vec![&l("patched"), &l("deep")]);

        assert!(!registry.overwrite("Missing", l("m")));
        assert!(!registry.contains("Missing"));
    }

    #[test]
    fn delete_all_and_delete_in() {
        let mut registry = Registry::with_entries([("X", l("a"))]);
        registry.register_front([("X", l("b"))]);
        registry.register_front([("X", l("c"))]);

        assert_eq!(registry.delete_in(1, "X"), Some(l("b")));
        assert_eq!(registry.delete_in(9, "X"), None);
        assert_eq!(registry.delete_all("X"), vec![l("c"), l("a")]);
        assert!(!registry.contains("X"));
    }

    #[test]
    fn compact_keeps_one_layer() {
        let mut registry = Registry::with_entries([("X", l("a"))]);
        registry.register_front([("Y", l("b"))]);
        registry.delete_all("X");
        registry.delete_all("Y");
        assert_eq!(registry.layers().len(), 2);

        registry.compact();
        assert_eq!(registry.layers().len(), 1);
        assert!(registry.is_empty());

        registry.set("Z", l("z"));
        assert_eq!(registry.get("Z"), Some(&l("z")));
    }

    #[test]
    fn iteration_is_sorted_and_first_wins() {
        let mut registry = Registry::with_entries([("b", l("b1")), ("a", l("a1"))]);
        registry.register_front([("c", l("c2")), ("b", l("b2"))]);

        let forward: Vec<(&str, &Locator)> = registry.iter().collect();
        assert_eq!(forward, vec![("a", &l("a1")), ("b", &l("b2")), ("c", &l("c2"))]);

        let backward: Vec<&str> = registry.iter().rev().map(|(name, _)| name).collect();
        assert_eq!(backward, vec!["c", "b", "a"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn search_by_substring() {
        let registry = Registry::with_entries([
            ("DataLibraryMenu", l("layers-menu-choice")),
            ("DataLibrarySearchInput", l("layer-search-box")),
            ("StoriesMenu", l("stories-menu-choice")),
        ]);
        assert_eq!(registry.search("Menu"), vec!["DataLibraryMenu", "StoriesMenu"]);
        assert!(registry.search("Zoom").is_empty());
    }
}
