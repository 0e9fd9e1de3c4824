//! Declarative module graph model.
//!
//! The model is data only: module references, their parent/child layout,
//! connector wiring and variable bindings. It is the only persisted part of a
//! modular rig; every runtime structure is rebuilt from it.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::namespace::{join_path, namespace_of_path, split_namespace, strip_namespace};
use crate::core::types::ElementKey;

/// One module in the model, identified by its computed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReference {
    pub name: String,
    /// Optional display name, unique among all modules when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Empty for root modules.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_path: String,
    pub type_id: String,
    /// Variable name to serialized default.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_values: BTreeMap<String, String>,
    /// Local variable name to `module/path:variable` or bare `variable` (the host rig).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
}

impl ModuleReference {
    pub fn new(name: &str, parent_path: &str, type_id: &str) -> Self {
        Self {
            name: name.to_string(),
            short_name: None,
            parent_path: parent_path.to_string(),
            type_id: type_id.to_string(),
            config_values: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> String {
        join_path(&self.parent_path, &self.name)
    }

    pub fn namespace(&self) -> String {
        namespace_of_path(&self.path())
    }

    pub fn is_root(&self) -> bool {
        self.parent_path.is_empty()
    }

    /// Short name when set, else the module name.
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

/// A connector wired to its target element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Fully namespaced connector (`Arm:parent`).
    pub connector: ElementKey,
    pub target: ElementKey,
}

impl Connection {
    /// Module path owning the connector, derived from its namespace.
    pub fn owner_path(&self) -> Option<&str> {
        split_namespace(&self.connector.name).map(|(path, _)| path)
    }
}

/// Ordered module references plus the flat connection list.
///
/// Each module's connection map is derived from the flat list on demand, so
/// the two views can never drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGraphModel {
    #[serde(default)]
    pub modules: Vec<ModuleReference>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl ModuleGraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Find a module by path. A trailing namespace separator is ignored.
    pub fn find_module(&self, path: &str) -> Option<&ModuleReference> {
        let path = path.strip_suffix(':').unwrap_or(path);
        self.modules.iter().find(|module| module.path() == path)
    }

    pub fn find_module_mut(&mut self, path: &str) -> Option<&mut ModuleReference> {
        let path = path.strip_suffix(':').unwrap_or(path);
        self.modules.iter_mut().find(|module| module.path() == path)
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.modules.iter().position(|module| module.path() == path)
    }

    pub fn roots(&self) -> Vec<&ModuleReference> {
        self.modules.iter().filter(|module| module.is_root()).collect()
    }

    /// Direct children of `path`, in model order.
    pub fn children_of(&self, path: &str) -> Vec<&ModuleReference> {
        self.modules
            .iter()
            .filter(|module| !module.is_root() && module.parent_path == path)
            .collect()
    }

    /// Modules in breadth-first order from the roots. Modules whose parent
    /// does not exist are not reachable and are left out.
    pub fn breadth_first(&self) -> Vec<&ModuleReference> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut expanded = HashSet::new();
        let mut queue: VecDeque<&ModuleReference> = self.roots().into_iter().collect();
        while let Some(module) = queue.pop_front() {
            order.push(module);
            let path = module.path();
            // Clashing siblings share a path; expand its children once.
            if expanded.insert(path.clone()) {
                queue.extend(self.children_of(&path));
            }
        }
        order
    }

    pub fn module_paths(&self) -> Vec<String> {
        self.modules.iter().map(ModuleReference::path).collect()
    }

    pub fn parent_path(&self, path: &str) -> Option<&str> {
        self.find_module(path)
            .filter(|module| !module.is_root())
            .map(|module| module.parent_path.as_str())
    }

    /// True if `path` is `ancestor` or nested anywhere below it.
    pub fn is_parented_to(&self, path: &str, ancestor: &str) -> bool {
        let mut current = Some(path);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent_path(candidate);
        }
        false
    }

    /// Sort paths so that parents come before their children (breadth-first model order).
    pub fn sort_paths(&self, paths: &mut [String]) {
        let order: Vec<String> = self.breadth_first().iter().map(|m| m.path()).collect();
        paths.sort_by_key(|path| order.iter().position(|p| p == path).unwrap_or(usize::MAX));
    }

    pub fn find_modules_of_type(&self, type_id: &str) -> Vec<&ModuleReference> {
        self.modules
            .iter()
            .filter(|module| module.type_id == type_id)
            .collect()
    }

    /// Connector map of one module: local connector key to target.
    pub fn module_connection_map(&self, path: &str) -> BTreeMap<ElementKey, ElementKey> {
        let namespace = namespace_of_path(path);
        self.connections
            .iter()
            .filter(|connection| connection.owner_path() == Some(path))
            .map(|connection| {
                let local = strip_namespace(&connection.connector.name, &namespace);
                (
                    ElementKey::new(connection.connector.kind, local),
                    connection.target.clone(),
                )
            })
            .collect()
    }

    pub fn connection_target(&self, connector: &ElementKey) -> Option<&ElementKey> {
        self.connections
            .iter()
            .find(|connection| &connection.connector == connector)
            .map(|connection| &connection.target)
    }

    pub fn find_connectors_from_target(&self, target: &ElementKey) -> Vec<&ElementKey> {
        self.connections
            .iter()
            .filter(|connection| &connection.target == target)
            .map(|connection| &connection.connector)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connect, model_of, module};

    fn sample() -> ModuleGraphModel {
        let mut model = model_of(vec![
            module("Spine", "", "SpineType"),
            module("ArmL", "Spine", "ArmType"),
            module("ArmR", "Spine", "ArmType"),
            module("Hand", "Spine/ArmL", "HandType"),
            module("Lost", "Missing", "HandType"),
        ]);
        connect(&mut model, "Spine/ArmL:parent", "Spine:chest");
        connect(&mut model, "Spine/ArmR:parent", "Spine:chest");
        model
    }

    #[test]
    fn breadth_first_skips_unreachable_modules() {
        let model = sample();
        let order: Vec<String> = model.breadth_first().iter().map(|m| m.path()).collect();
        assert_eq!(
            order,
            vec!["Spine", "Spine/ArmL", "Spine/ArmR", "Spine/ArmL/Hand"]
        );
    }

    #[test]
    fn find_module_ignores_trailing_namespace_separator() {
        let model = sample();
        assert!(model.find_module("Spine/ArmL:").is_some());
        assert!(model.find_module("Spine/Leg").is_none());
    }

    #[test]
    fn ancestry_queries() {
        let model = sample();
        assert!(model.is_parented_to("Spine/ArmL/Hand", "Spine"));
        assert!(!model.is_parented_to("Spine/ArmR", "Spine/ArmL"));
        assert_eq!(model.parent_path("Spine/ArmL"), Some("Spine"));
        assert_eq!(model.parent_path("Spine"), None);
    }

    #[test]
    fn sort_paths_puts_parents_first() {
        let model = sample();
        let mut paths = vec![
            "Spine/ArmL/Hand".to_string(),
            "Spine".to_string(),
            "Spine/ArmR".to_string(),
        ];
        model.sort_paths(&mut paths);
        assert_eq!(paths, vec!["Spine", "Spine/ArmR", "Spine/ArmL/Hand"]);
    }

    #[test]
    fn connection_map_is_local_to_the_module() {
        let model = sample();
        let map = model.module_connection_map("Spine/ArmL");
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&ElementKey::connector("parent")),
            Some(&ElementKey::bone("Spine:chest"))
        );
        assert!(model.module_connection_map("Spine").is_empty());
        assert_eq!(
            model
                .find_connectors_from_target(&ElementKey::bone("Spine:chest"))
                .len(),
            2
        );
    }

    #[test]
    fn serializes_without_empty_fields() {
        let model = model_of(vec![module("Root", "", "RootType")]);
        let json = serde_json::to_value(&model).expect("serialize");
        let root = &json["modules"][0];
        assert!(root.get("parent_path").is_none());
        assert!(root.get("bindings").is_none());
        assert_eq!(root["type_id"], "RootType");
    }
}
