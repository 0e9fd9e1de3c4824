//! Author-time edits of a module graph model.
//!
//! Every edit validates first and leaves the model untouched on error, so a
//! failed edit never produces a model that breaks the invariants.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::bindings::BindingExpr;
use crate::core::model::{Connection, ModuleGraphModel, ModuleReference};
use crate::core::namespace::{
    PATH_SEPARATOR, is_below_namespace, is_in_namespace, is_valid_module_name, join_namespace,
    join_path, namespace_of_path, split_namespace,
};
use crate::core::types::{ElementKey, ElementKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("module '{0}' not found")]
    ModuleNotFound(String),
    #[error("parent module '{0}' not found")]
    ParentNotFound(String),
    #[error("{}", clash_message(.parent, .name))]
    NameClash { parent: String, name: String },
    #[error("short name '{0}' is already used")]
    ShortNameTaken(String),
    #[error("cannot parent '{path}' under itself or its descendant '{parent}'")]
    Cycle { path: String, parent: String },
    #[error("{0} is not a connector")]
    NotAConnector(ElementKey),
    #[error("{0} does not belong to an existing module")]
    ConnectorNotOwned(ElementKey),
    #[error("cannot connect {connector} to {target} inside its own namespace")]
    ConnectWithinNamespace { connector: ElementKey, target: ElementKey },
    #[error("{0} is not connected")]
    NotConnected(ElementKey),
    #[error("cannot bind {path}.{variable}: {reason}")]
    InvalidBinding { path: String, variable: String, reason: String },
    #[error("{path}.{variable} has no binding")]
    BindingNotFound { path: String, variable: String },
}

fn clash_message(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        format!("a root module named '{name}' already exists")
    } else {
        format!("module '{parent}' already has a child named '{name}'")
    }
}

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\- ]").unwrap());

/// Replace characters that are not allowed in module names with `_`.
pub fn sanitize_name(name: &str) -> String {
    let sanitized = INVALID_NAME_CHARS.replace_all(name.trim(), "_");
    if sanitized.is_empty() {
        return "Module".to_string();
    }
    sanitized.into_owned()
}

/// Rewrite `value` if it is `old` or nested below it.
fn rewrite_path(value: &str, old: &str, new: &str) -> Option<String> {
    if value == old {
        return Some(new.to_string());
    }
    value
        .strip_prefix(old)
        .filter(|rest| rest.starts_with(PATH_SEPARATOR))
        .map(|rest| format!("{new}{rest}"))
}

fn rewrite_element(key: &ElementKey, old: &str, new: &str) -> Option<ElementKey> {
    let (path, short) = split_namespace(&key.name)?;
    let path = rewrite_path(path, old, new)?;
    Some(ElementKey::new(key.kind, join_namespace(&path, short)))
}

pub struct ModelController<'a> {
    model: &'a mut ModuleGraphModel,
}

impl<'a> ModelController<'a> {
    pub fn new(model: &'a mut ModuleGraphModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModuleGraphModel {
        self.model
    }

    /// True if no sibling under `parent_path` uses `name` (case-insensitive).
    pub fn is_name_available(&self, parent_path: &str, name: &str) -> bool {
        !self.model.modules.iter().any(|module| {
            module.parent_path == parent_path && module.name.eq_ignore_ascii_case(name)
        })
    }

    /// A sanitized name based on `desired` that is free under `parent_path`.
    pub fn safe_new_name(&self, parent_path: &str, desired: &str) -> String {
        let base = sanitize_name(desired);
        if self.is_name_available(parent_path, &base) {
            return base;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}_{suffix}");
            if self.is_name_available(parent_path, &candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn require_module(&self, path: &str) -> Result<&ModuleReference, EditError> {
        self.model
            .find_module(path)
            .ok_or_else(|| EditError::ModuleNotFound(path.to_string()))
    }

    fn check_new_name(&self, parent_path: &str, name: &str) -> Result<(), EditError> {
        if !is_valid_module_name(name) {
            return Err(EditError::InvalidName(name.to_string()));
        }
        if !self.is_name_available(parent_path, name) {
            return Err(EditError::NameClash {
                parent: parent_path.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Add a module under `parent_path` (empty for a root); returns its path.
    pub fn add_module(
        &mut self,
        name: &str,
        type_id: &str,
        parent_path: &str,
    ) -> Result<String, EditError> {
        if !parent_path.is_empty() && self.model.find_module(parent_path).is_none() {
            return Err(EditError::ParentNotFound(parent_path.to_string()));
        }
        self.check_new_name(parent_path, name)?;
        let module = ModuleReference::new(name, parent_path, type_id);
        let path = module.path();
        self.model.modules.push(module);
        Ok(path)
    }

    /// Delete a module with its subtree, their connections and every binding
    /// sourced from them.
    pub fn delete_module(&mut self, path: &str) -> Result<(), EditError> {
        let path = self.require_module(path)?.path();
        let doomed: Vec<String> = self
            .model
            .module_paths()
            .into_iter()
            .filter(|candidate| self.model.is_parented_to(candidate, &path))
            .collect();
        let owned_by_doomed = |key: &ElementKey| {
            split_namespace(&key.name).is_some_and(|(owner, _)| doomed.iter().any(|p| p == owner))
        };

        self.model
            .modules
            .retain(|module| !doomed.contains(&module.path()));
        self.model.connections.retain(|connection| {
            !owned_by_doomed(&connection.connector) && !owned_by_doomed(&connection.target)
        });
        for module in &mut self.model.modules {
            module.bindings.retain(|_, expr| {
                BindingExpr::parse(expr).map_or(true, |binding| {
                    !doomed.contains(&binding.source_path)
                })
            });
        }
        Ok(())
    }

    /// Rename a module; returns the new path.
    pub fn rename_module(&mut self, path: &str, new_name: &str) -> Result<String, EditError> {
        let module = self.require_module(path)?;
        let (old_path, parent_path, old_name) =
            (module.path(), module.parent_path.clone(), module.name.clone());
        if old_name == new_name {
            return Ok(old_path);
        }
        if !old_name.eq_ignore_ascii_case(new_name) {
            self.check_new_name(&parent_path, new_name)?;
        } else if !is_valid_module_name(new_name) {
            return Err(EditError::InvalidName(new_name.to_string()));
        }
        let new_path = join_path(&parent_path, new_name);
        if let Some(module) = self.model.find_module_mut(&old_path) {
            module.name = new_name.to_string();
        }
        self.rewrite_references(&old_path, &new_path);
        Ok(new_path)
    }

    /// Move a module (and its subtree) under `new_parent`; returns the new path.
    pub fn reparent_module(&mut self, path: &str, new_parent: &str) -> Result<String, EditError> {
        let module = self.require_module(path)?;
        let (old_path, name) = (module.path(), module.name.clone());
        if module.parent_path == new_parent {
            return Ok(old_path);
        }
        if !new_parent.is_empty() {
            if self.model.find_module(new_parent).is_none() {
                return Err(EditError::ParentNotFound(new_parent.to_string()));
            }
            if self.model.is_parented_to(new_parent, &old_path) {
                return Err(EditError::Cycle {
                    path: old_path,
                    parent: new_parent.to_string(),
                });
            }
        }
        self.check_new_name(new_parent, &name)?;

        let new_path = join_path(new_parent, &name);
        if let Some(module) = self.model.find_module_mut(&old_path) {
            module.parent_path = new_parent.to_string();
        }
        self.rewrite_references(&old_path, &new_path);

        // Keep parents listed before children: the moved subtree goes last.
        let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.model.modules)
            .into_iter()
            .partition(|module| rewrite_path(&module.path(), &new_path, &new_path).is_some());
        self.model.modules = kept;
        self.model.modules.extend(moved);
        Ok(new_path)
    }

    /// Rewrite descendant parent paths, connections and binding sources after
    /// the module at `old` moved to `new`.
    fn rewrite_references(&mut self, old: &str, new: &str) {
        for module in &mut self.model.modules {
            if let Some(parent) = rewrite_path(&module.parent_path, old, new) {
                module.parent_path = parent;
            }
            for expr in module.bindings.values_mut() {
                let Ok(binding) = BindingExpr::parse(expr) else {
                    continue;
                };
                if let Some(source) = rewrite_path(&binding.source_path, old, new) {
                    *expr = join_namespace(&source, &binding.variable);
                }
            }
        }
        for connection in &mut self.model.connections {
            if let Some(connector) = rewrite_element(&connection.connector, old, new) {
                connection.connector = connector;
            }
            if let Some(target) = rewrite_element(&connection.target, old, new) {
                connection.target = target;
            }
        }
    }

    /// Set (or clear, with an empty string) the display name of a module.
    pub fn set_short_name(&mut self, path: &str, short_name: &str) -> Result<(), EditError> {
        let path = self.require_module(path)?.path();
        let short_name = short_name.trim();
        if short_name.is_empty() {
            if let Some(module) = self.model.find_module_mut(&path) {
                module.short_name = None;
            }
            return Ok(());
        }
        if short_name.contains(PATH_SEPARATOR) || short_name.contains(':') {
            return Err(EditError::InvalidName(short_name.to_string()));
        }
        let taken = self.model.modules.iter().any(|module| {
            module.path() != path
                && module
                    .short_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(short_name))
        });
        if taken {
            return Err(EditError::ShortNameTaken(short_name.to_string()));
        }
        if let Some(module) = self.model.find_module_mut(&path) {
            module.short_name = Some(short_name.to_string());
        }
        Ok(())
    }

    /// Wire `connector` to `target`, replacing any previous target.
    pub fn connect(&mut self, connector: ElementKey, target: ElementKey) -> Result<(), EditError> {
        if connector.kind != ElementKind::Connector {
            return Err(EditError::NotAConnector(connector));
        }
        let owner = match split_namespace(&connector.name) {
            Some((owner, _)) if self.model.find_module(owner).is_some() => owner.to_string(),
            _ => return Err(EditError::ConnectorNotOwned(connector)),
        };
        let namespace = namespace_of_path(&owner);
        if is_in_namespace(&target.name, &namespace) || is_below_namespace(&target.name, &namespace)
        {
            return Err(EditError::ConnectWithinNamespace { connector, target });
        }
        match self
            .model
            .connections
            .iter_mut()
            .find(|connection| connection.connector == connector)
        {
            Some(existing) => existing.target = target,
            None => self.model.connections.push(Connection { connector, target }),
        }
        Ok(())
    }

    pub fn disconnect(&mut self, connector: &ElementKey) -> Result<(), EditError> {
        let before = self.model.connections.len();
        self.model
            .connections
            .retain(|connection| &connection.connector != connector);
        if self.model.connections.len() == before {
            return Err(EditError::NotConnected(connector.clone()));
        }
        Ok(())
    }

    pub fn set_config_value(
        &mut self,
        path: &str,
        variable: &str,
        value: &str,
    ) -> Result<(), EditError> {
        if variable.trim().is_empty() {
            return Err(EditError::InvalidName(variable.to_string()));
        }
        let path = self.require_module(path)?.path();
        if let Some(module) = self.model.find_module_mut(&path) {
            module
                .config_values
                .insert(variable.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Bind `variable` of the module at `path` to `source_expr`.
    pub fn bind_variable(
        &mut self,
        path: &str,
        variable: &str,
        source_expr: &str,
    ) -> Result<(), EditError> {
        let path = self.require_module(path)?.path();
        let invalid = |reason: String| EditError::InvalidBinding {
            path: path.clone(),
            variable: variable.to_string(),
            reason,
        };
        if variable.trim().is_empty() {
            return Err(invalid("variable name is empty".to_string()));
        }
        let binding = BindingExpr::parse(source_expr).map_err(&invalid)?;
        if !binding.is_host() {
            if self.model.find_module(&binding.source_path).is_none() {
                return Err(invalid(format!(
                    "source module '{}' not found",
                    binding.source_path
                )));
            }
            if self.model.is_parented_to(&binding.source_path, &path) {
                return Err(invalid(
                    "cannot bind to the module itself or one of its descendants".to_string(),
                ));
            }
        }
        if let Some(module) = self.model.find_module_mut(&path) {
            module
                .bindings
                .insert(variable.to_string(), binding.to_string());
        }
        Ok(())
    }

    pub fn unbind_variable(&mut self, path: &str, variable: &str) -> Result<(), EditError> {
        let path = self.require_module(path)?.path();
        let removed = self
            .model
            .find_module_mut(&path)
            .and_then(|module| module.bindings.remove(variable));
        match removed {
            Some(_) => Ok(()),
            None => Err(EditError::BindingNotFound {
                path,
                variable: variable.to_string(),
            }),
        }
    }
}
