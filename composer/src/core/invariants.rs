//! Semantic invariants of a module graph model not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::bindings::BindingExpr;
use crate::core::model::ModuleGraphModel;
use crate::core::namespace::is_valid_module_name;
use crate::core::types::ElementKind;

/// Check semantic invariants:
/// - Module names are valid and unique among siblings
/// - Every parent path resolves to a module listed before the child
/// - Short names are unique among all modules
/// - Connections start at a connector owned by an existing module, one target per connector
/// - Binding expressions are well formed and name an existing, unrelated source module
pub fn validate_invariants(model: &ModuleGraphModel) -> Vec<String> {
    let mut errors = Vec::new();
    validate_modules(model, &mut errors);
    validate_connections(model, &mut errors);
    validate_bindings(model, &mut errors);
    errors
}

fn validate_modules(model: &ModuleGraphModel, errors: &mut Vec<String>) {
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut short_names: HashSet<String> = HashSet::new();

    for module in &model.modules {
        let path = module.path();
        if !is_valid_module_name(&module.name) {
            errors.push(format!("{path}: invalid module name '{}'", module.name));
        }
        if module.type_id.trim().is_empty() {
            errors.push(format!("{path}: type_id must not be empty"));
        }
        if !module.is_root() && !seen_paths.contains(&module.parent_path.to_ascii_lowercase()) {
            errors.push(format!(
                "{path}: parent '{}' must exist and be listed before the module",
                module.parent_path
            ));
        }
        if !seen_paths.insert(path.to_ascii_lowercase()) {
            errors.push(format!("{path}: name clashes with a sibling"));
        }
        if let Some(short_name) = &module.short_name {
            if !short_names.insert(short_name.to_ascii_lowercase()) {
                errors.push(format!("{path}: short name '{short_name}' is already used"));
            }
        }
        if module.config_values.keys().any(|key| key.trim().is_empty()) {
            errors.push(format!("{path}: config value names must not be empty"));
        }
    }
}

fn validate_connections(model: &ModuleGraphModel, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for connection in &model.connections {
        let connector = &connection.connector;
        if connector.kind != ElementKind::Connector {
            errors.push(format!("connection source {connector} is not a connector"));
        }
        match connection.owner_path() {
            Some(owner) if model.find_module(owner).is_some() => {}
            _ => errors.push(format!(
                "connection source {connector} is not owned by an existing module"
            )),
        }
        if !seen.insert(connector.clone()) {
            errors.push(format!("connector {connector} is connected more than once"));
        }
    }
}

fn validate_bindings(model: &ModuleGraphModel, errors: &mut Vec<String>) {
    for module in &model.modules {
        let path = module.path();
        for (variable, expr) in &module.bindings {
            if variable.trim().is_empty() {
                errors.push(format!("{path}: binding with empty variable name"));
                continue;
            }
            let binding = match BindingExpr::parse(expr) {
                Ok(binding) => binding,
                Err(err) => {
                    errors.push(format!("{path}.{variable}: {err}"));
                    continue;
                }
            };
            if binding.is_host() {
                continue;
            }
            if model.find_module(&binding.source_path).is_none() {
                errors.push(format!(
                    "{path}.{variable}: source module '{}' does not exist",
                    binding.source_path
                ));
            } else if model.is_parented_to(&binding.source_path, &path) {
                errors.push(format!(
                    "{path}.{variable}: cannot bind to itself or a descendant ('{}')",
                    binding.source_path
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModuleReference;
    use crate::test_support::{bind, connect, model_of, module};

    #[test]
    fn valid_model_has_no_errors() {
        let mut model = model_of(vec![
            module("Root", "", "RootType"),
            module("Child", "Root", "ChildType"),
        ]);
        connect(&mut model, "Root/Child:parent", "Root:chest");
        bind(&mut model, "Root/Child", "speed", "Root:speed");
        bind(&mut model, "Root", "speed", "globalSpeed");
        assert!(validate_invariants(&model).is_empty());
    }

    #[test]
    fn detects_missing_or_late_parent() {
        let model = model_of(vec![
            module("Child", "Root", "ChildType"),
            module("Root", "", "RootType"),
        ]);
        let errors = validate_invariants(&model);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Root/Child"));
    }

    #[test]
    fn detects_sibling_clash_case_insensitively() {
        let model = model_of(vec![
            module("Root", "", "RootType"),
            module("Arm", "Root", "ArmType"),
            module("arm", "Root", "ArmType"),
        ]);
        let errors = validate_invariants(&model);
        assert!(errors.iter().any(|err| err.contains("clashes")));
    }

    #[test]
    fn detects_duplicate_short_names() {
        let mut left = ModuleReference::new("ArmL", "", "ArmType");
        left.short_name = Some("Arm".to_string());
        let mut right = ModuleReference::new("ArmR", "", "ArmType");
        right.short_name = Some("arm".to_string());
        let errors = validate_invariants(&model_of(vec![left, right]));
        assert!(errors.iter().any(|err| err.contains("short name")));
    }

    #[test]
    fn detects_orphan_connection_and_double_wiring() {
        let mut model = model_of(vec![module("Root", "", "RootType")]);
        connect(&mut model, "Ghost:parent", "root");
        connect(&mut model, "Root:parent", "root");
        connect(&mut model, "Root:parent", "pelvis");
        let errors = validate_invariants(&model);
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn detects_self_and_descendant_bindings() {
        let mut model = model_of(vec![
            module("Root", "", "RootType"),
            module("Child", "Root", "ChildType"),
        ]);
        bind(&mut model, "Root", "a", "Root:b");
        bind(&mut model, "Root", "c", "Root/Child:d");
        bind(&mut model, "Root/Child", "e", "Nowhere:f");
        let errors = validate_invariants(&model);
        assert_eq!(errors.len(), 3, "{errors:?}");
    }
}
