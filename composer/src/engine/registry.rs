//! Published model snapshots keyed by rig type.
//!
//! A model is published once per rig type and shared as an immutable
//! [`Arc`]; modular rigs built from that type read the snapshot without
//! owning it. Publishing a new snapshot never mutates the old one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::core::model::ModuleGraphModel;

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    models: RwLock<HashMap<String, Arc<ModuleGraphModel>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `model` as the current snapshot for `rig_type`.
    pub fn publish(&self, rig_type: &str, model: ModuleGraphModel) -> Arc<ModuleGraphModel> {
        let snapshot = Arc::new(model);
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        models.insert(rig_type.to_string(), Arc::clone(&snapshot));
        debug!(rig_type, modules = snapshot.modules.len(), "published model");
        snapshot
    }

    pub fn get(&self, rig_type: &str) -> Option<Arc<ModuleGraphModel>> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.get(rig_type).cloned()
    }

    pub fn rig_types(&self) -> Vec<String> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<String> = models.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{model_of, module};

    #[test]
    fn publish_replaces_snapshot_without_mutating_old_one() {
        let registry = ModuleRegistry::new();
        let first = registry.publish("Biped", model_of(vec![module("Root", "", "RootType")]));
        let second = registry.publish("Biped", ModuleGraphModel::new());

        assert_eq!(first.modules.len(), 1);
        let current = registry.get("Biped").expect("published");
        assert!(Arc::ptr_eq(&current, &second));
        assert!(registry.get("Quadruped").is_none());
        assert_eq!(registry.rig_types(), vec!["Biped"]);
    }
}
