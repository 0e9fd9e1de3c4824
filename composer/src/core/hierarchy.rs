//! Minimal shared element store.
//!
//! Transform storage lives elsewhere; this keeps the element *set* the engine
//! needs to map elements to modules, seed connector candidates and compute
//! display paths. Records keep insertion order so every traversal is
//! deterministic.

use std::collections::HashMap;

use crate::core::namespace::{join_namespace, namespace_of_path, split_namespace};
use crate::core::types::{ElementKey, ElementKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub key: ElementKey,
    pub parent: Option<ElementKey>,
    /// Path of the module that spawned the element, if any.
    pub module_path: Option<String>,
    /// Name the module asked for, before namespacing.
    pub desired_name: Option<String>,
    /// Marks the primary connector of a module.
    pub primary: bool,
}

impl ElementRecord {
    pub fn new(key: ElementKey) -> Self {
        Self {
            key,
            parent: None,
            module_path: None,
            desired_name: None,
            primary: false,
        }
    }

    pub fn with_parent(mut self, parent: Option<ElementKey>) -> Self {
        self.parent = parent;
        self
    }

    pub fn in_module(mut self, module_path: &str, desired_name: &str) -> Self {
        self.module_path = Some(module_path.to_string());
        self.desired_name = Some(desired_name.to_string());
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementHierarchy {
    records: Vec<ElementRecord>,
    index: HashMap<ElementKey, usize>,
    active_namespace: String,
    version: u64,
}

impl ElementHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element. Adding an existing key is a no-op and returns `false`.
    pub fn add(&mut self, record: ElementRecord) -> bool {
        if self.index.contains_key(&record.key) {
            return false;
        }
        self.index.insert(record.key.clone(), self.records.len());
        self.records.push(record);
        self.version += 1;
        true
    }

    pub fn remove(&mut self, key: &ElementKey) -> bool {
        self.retain(|record| &record.key != key) > 0
    }

    /// Keep only the records matching `keep`; returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&ElementRecord) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|record| keep(record));
        let removed = before - self.records.len();
        if removed > 0 {
            self.reindex();
            self.version += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        if self.records.is_empty() {
            return;
        }
        self.records.clear();
        self.index.clear();
        self.version += 1;
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.key.clone(), idx))
            .collect();
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &ElementKey) -> Option<&ElementRecord> {
        self.index.get(key).map(|idx| &self.records[*idx])
    }

    pub fn records(&self) -> &[ElementRecord] {
        &self.records
    }

    pub fn keys(&self) -> impl Iterator<Item = &ElementKey> {
        self.records.iter().map(|record| &record.key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every mutation; caches derived from the element set compare against it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Module path owning `key`: the recorded metadata, else the name's namespace.
    pub fn module_path_of(&self, key: &ElementKey) -> Option<String> {
        if let Some(path) = self.get(key).and_then(|record| record.module_path.clone()) {
            return Some(path);
        }
        split_namespace(&key.name).map(|(path, _)| path.to_string())
    }

    pub fn namespace_of(&self, key: &ElementKey) -> Option<String> {
        self.module_path_of(key).map(|path| namespace_of_path(&path))
    }

    /// The bare name of `key`, without its module namespace.
    pub fn desired_name<'a>(&'a self, key: &'a ElementKey) -> &'a str {
        if let Some(desired) = self.get(key).and_then(|record| record.desired_name.as_deref()) {
            return desired;
        }
        split_namespace(&key.name).map_or(key.name.as_str(), |(_, short)| short)
    }

    pub fn connectors(&self) -> Vec<&ElementKey> {
        self.keys()
            .filter(|key| key.kind == ElementKind::Connector)
            .collect()
    }

    pub fn connectors_of_module(&self, module_path: &str) -> Vec<&ElementKey> {
        self.connectors()
            .into_iter()
            .filter(|key| {
                self.module_path_of(key)
                    .is_some_and(|path| path.eq_ignore_ascii_case(module_path))
            })
            .collect()
    }

    /// The connector flagged primary for `module_path`. Secondary connectors
    /// never stand in for it.
    pub fn primary_connector_of_module(&self, module_path: &str) -> Option<&ElementKey> {
        self.connectors_of_module(module_path)
            .into_iter()
            .find(|key| self.get(key).is_some_and(|record| record.primary))
    }

    pub fn active_namespace(&self) -> &str {
        &self.active_namespace
    }

    /// Swap the namespace used for name lookups; returns the previous one.
    pub fn set_active_namespace(&mut self, namespace: String) -> String {
        std::mem::replace(&mut self.active_namespace, namespace)
    }

    /// Find an element by name, preferring the active namespace.
    pub fn find(&self, kind: ElementKind, name: &str) -> Option<&ElementKey> {
        if !self.active_namespace.is_empty() {
            let namespaced = ElementKey::new(kind, join_namespace(&self.active_namespace, name));
            if let Some(idx) = self.index.get(&namespaced) {
                return Some(&self.records[*idx].key);
            }
        }
        self.index
            .get(&ElementKey::new(kind, name))
            .map(|idx| &self.records[*idx].key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ElementHierarchy {
        let mut hierarchy = ElementHierarchy::new();
        hierarchy.add(ElementRecord::new(ElementKey::bone("root")));
        hierarchy.add(
            ElementRecord::new(ElementKey::connector("Arm:parent"))
                .in_module("Arm", "parent"),
        );
        hierarchy.add(
            ElementRecord::new(ElementKey::connector("Arm:pole"))
                .in_module("Arm", "pole")
                .primary(true),
        );
        hierarchy.add(
            ElementRecord::new(ElementKey::bone("Arm:hand"))
                .with_parent(Some(ElementKey::bone("root"))),
        );
        hierarchy
    }

    #[test]
    fn add_is_idempotent() {
        let mut hierarchy = sample();
        let version = hierarchy.version();
        assert!(!hierarchy.add(ElementRecord::new(ElementKey::bone("root"))));
        assert_eq!(hierarchy.len(), 4);
        assert_eq!(hierarchy.version(), version);
    }

    #[test]
    fn remove_reindexes_remaining_records() {
        let mut hierarchy = sample();
        assert!(hierarchy.remove(&ElementKey::bone("root")));
        assert!(!hierarchy.contains(&ElementKey::bone("root")));
        assert_eq!(
            hierarchy.get(&ElementKey::bone("Arm:hand")).map(|r| &r.key),
            Some(&ElementKey::bone("Arm:hand"))
        );
    }

    #[test]
    fn module_path_falls_back_to_name_namespace() {
        let hierarchy = sample();
        assert_eq!(
            hierarchy.module_path_of(&ElementKey::bone("Arm:hand")),
            Some("Arm".to_string())
        );
        assert_eq!(hierarchy.module_path_of(&ElementKey::bone("root")), None);
        assert_eq!(hierarchy.desired_name(&ElementKey::bone("Arm:hand")), "hand");
    }

    #[test]
    fn primary_connector_prefers_flag() {
        let hierarchy = sample();
        assert_eq!(
            hierarchy.primary_connector_of_module("Arm"),
            Some(&ElementKey::connector("Arm:pole"))
        );
        assert_eq!(hierarchy.primary_connector_of_module("Leg"), None);
    }

    #[test]
    fn secondary_connectors_are_not_primary() {
        let mut hierarchy = ElementHierarchy::new();
        hierarchy.add(
            ElementRecord::new(ElementKey::connector("Leg:knee")).in_module("Leg", "knee"),
        );
        assert_eq!(hierarchy.connectors_of_module("Leg").len(), 1);
        assert_eq!(hierarchy.primary_connector_of_module("Leg"), None);
    }

    #[test]
    fn find_prefers_active_namespace() {
        let mut hierarchy = sample();
        hierarchy.add(ElementRecord::new(ElementKey::bone("hand")));
        assert_eq!(
            hierarchy.find(ElementKind::Bone, "hand"),
            Some(&ElementKey::bone("hand"))
        );
        let previous = hierarchy.set_active_namespace("Arm:".to_string());
        assert_eq!(previous, "");
        assert_eq!(
            hierarchy.find(ElementKind::Bone, "hand"),
            Some(&ElementKey::bone("Arm:hand"))
        );
    }
}
