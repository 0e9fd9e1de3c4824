//! Declarative rig types.
//!
//! A type library describes rig types as data: which events they run, their
//! public variables, the elements and connectors they spawn on construction
//! and how their connectors rank candidates. [`LibraryFactory`] turns the
//! library into [`DeclarativeRig`]s for the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{
    ElementKey, ElementKind, ResolveMatch, Variable, VariableType, VariableValue, events,
};
use crate::engine::context::ExecuteContext;
use crate::engine::rig::{ExecutableRig, RigCapabilities, RigFactory};

/// All rig types known to a factory, keyed by type identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeLibrary {
    pub types: BTreeMap<String, RigTypeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigTypeDef {
    /// Only module types can be composed into a modular rig.
    pub module: bool,
    pub events: Vec<String>,
    pub variables: BTreeMap<String, VariableDef>,
    pub elements: Vec<ElementDef>,
    pub connectors: Vec<ConnectorDef>,
}

impl Default for RigTypeDef {
    fn default() -> Self {
        Self {
            module: true,
            events: Vec::new(),
            variables: BTreeMap::new(),
            elements: Vec::new(),
            connectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDef {
    #[serde(rename = "type")]
    pub ty: VariableType,
    /// Serialized default; the type's zero value when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl VariableDef {
    pub fn default_value(&self) -> Result<VariableValue, String> {
        match &self.default {
            Some(raw) => VariableValue::parse(self.ty, raw),
            None => Ok(VariableValue::default_for(self.ty)),
        }
    }
}

/// Element spawned in the module's namespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDef {
    pub kind: ElementKind,
    pub name: String,
    /// Looked up in the module's namespace first; a connector parent is
    /// replaced by its wired target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorDef {
    pub name: String,
    pub primary: bool,
    /// Bare name of the candidate to promote to default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer: Option<String>,
    /// Element kinds this connector never accepts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject_kinds: Vec<ElementKind>,
}

impl TypeLibrary {
    /// Problems in the library, one message per problem.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, def) in &self.types {
            if name.trim().is_empty() {
                errors.push("type name must be non-empty".to_string());
            }
            if def.events.iter().any(|event| event.trim().is_empty()) {
                errors.push(format!("type '{name}': event names must be non-empty"));
            }
            for (variable, var_def) in &def.variables {
                if let Err(err) = var_def.default_value() {
                    errors.push(format!("type '{name}': variable '{variable}': {err}"));
                }
            }
            let mut seen: Vec<&str> = Vec::new();
            for connector in &def.connectors {
                if connector.name.trim().is_empty() {
                    errors.push(format!("type '{name}': connector name must be non-empty"));
                }
                if seen.contains(&connector.name.as_str()) {
                    errors.push(format!(
                        "type '{name}': duplicate connector '{}'",
                        connector.name
                    ));
                }
                seen.push(&connector.name);
            }
            if def.connectors.iter().filter(|c| c.primary).count() > 1 {
                errors.push(format!("type '{name}': more than one primary connector"));
            }
            for element in &def.elements {
                if element.kind == ElementKind::Connector {
                    errors.push(format!(
                        "type '{name}': element '{}' must be declared as a connector",
                        element.name
                    ));
                }
            }
        }
        errors
    }
}

/// Rig driven entirely by a [`RigTypeDef`].
#[derive(Debug, Clone)]
pub struct DeclarativeRig {
    rig_type: String,
    def: Arc<RigTypeDef>,
    variables: BTreeMap<String, Variable>,
    executions: BTreeMap<String, usize>,
}

impl DeclarativeRig {
    pub fn new(rig_type: &str, def: Arc<RigTypeDef>) -> Self {
        let variables = def
            .variables
            .iter()
            .map(|(name, var_def)| {
                let value = var_def
                    .default_value()
                    .unwrap_or_else(|_| VariableValue::default_for(var_def.ty));
                (name.clone(), Variable::new(value))
            })
            .collect();
        Self {
            rig_type: rig_type.to_string(),
            def,
            variables,
            executions: BTreeMap::new(),
        }
    }

    /// How often `event` ran on this rig.
    pub fn execution_count(&self, event: &str) -> usize {
        self.executions.get(event).copied().unwrap_or_default()
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.variables
    }

    fn construct(&self, ctx: &mut ExecuteContext<'_>) {
        for connector in &self.def.connectors {
            ctx.add_connector(&connector.name, connector.primary);
        }
        for element in &self.def.elements {
            let parent = element.parent.as_ref().map(|parent| {
                ctx.find_element(parent.kind, &parent.name)
                    .unwrap_or_else(|| parent.clone())
            });
            ctx.add_element(element.kind, &element.name, parent);
        }
    }

    fn filter_candidates(&self, ctx: &mut ExecuteContext<'_>) {
        let Some(connector) = ctx.connector().cloned() else {
            return;
        };
        let Some(def) = self
            .def
            .connectors
            .iter()
            .find(|def| def.name.eq_ignore_ascii_case(&connector.name))
        else {
            debug!(connector = %connector, "connector not declared by type");
            return;
        };

        let candidates = ctx.candidates();
        let rejected: Vec<ElementKey> = candidates
            .iter()
            .filter(|candidate| def.reject_kinds.contains(&candidate.key.kind))
            .map(|candidate| candidate.key.clone())
            .collect();
        if !rejected.is_empty() {
            let reason = format!("Rejected by type '{}'.", self.rig_type);
            ctx.discard_matches(&rejected, &reason);
        }

        let Some(prefer) = def.prefer.as_deref() else {
            return;
        };
        let preferred = ctx
            .candidates()
            .into_iter()
            .map(|candidate: ResolveMatch| candidate.key)
            .find(|key| ctx.hierarchy().desired_name(key).eq_ignore_ascii_case(prefer));
        if let Some(key) = preferred {
            ctx.set_default_match(&key);
        }
    }
}

impl ExecutableRig for DeclarativeRig {
    fn rig_type(&self) -> &str {
        &self.rig_type
    }

    /// Declared events, plus construction and connector handling when the
    /// type spawns anything.
    fn supported_events(&self) -> Vec<String> {
        let mut supported = self.def.events.clone();
        let spawns = !self.def.elements.is_empty() || !self.def.connectors.is_empty();
        if spawns && !supported.iter().any(|event| event == events::CONSTRUCTION) {
            supported.push(events::CONSTRUCTION.to_string());
        }
        if !self.def.connectors.is_empty()
            && !supported.iter().any(|event| event == events::CONNECTOR)
        {
            supported.push(events::CONNECTOR.to_string());
        }
        supported
    }

    fn execute(&mut self, event: &str, ctx: &mut ExecuteContext<'_>) {
        *self.executions.entry(event.to_string()).or_default() += 1;
        match event {
            events::CONSTRUCTION => self.construct(ctx),
            events::CONNECTOR => self.filter_candidates(ctx),
            _ => debug!(module = %ctx.module_path(), event, "declarative rig has no logic for event"),
        }
    }

    fn public_variable(&self, name: &str) -> Option<Variable> {
        self.variables.get(name).cloned()
    }

    fn set_public_variable(&mut self, name: &str, value: VariableValue) -> Result<(), String> {
        let Some(variable) = self.variables.get_mut(name) else {
            return Err(format!("unknown variable '{name}'"));
        };
        if !variable.ty.accepts(value.variable_type()) {
            return Err(format!(
                "variable '{name}' is {}, got {}",
                variable.ty,
                value.variable_type()
            ));
        }
        variable.value = value;
        Ok(())
    }

    fn on_detached(&mut self) {
        debug!(rig_type = %self.rig_type, "declarative rig detached");
    }
}

/// [`RigFactory`] backed by a [`TypeLibrary`].
#[derive(Debug, Clone, Default)]
pub struct LibraryFactory {
    types: BTreeMap<String, Arc<RigTypeDef>>,
}

impl LibraryFactory {
    pub fn new(library: TypeLibrary) -> Self {
        Self {
            types: library
                .types
                .into_iter()
                .map(|(name, def)| (name, Arc::new(def)))
                .collect(),
        }
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl RigFactory for LibraryFactory {
    fn describe(&self, rig_type: &str) -> Option<RigCapabilities> {
        let def = self.types.get(rig_type)?;
        let events = DeclarativeRig::new(rig_type, Arc::clone(def)).supported_events();
        Some(RigCapabilities {
            is_module: def.module,
            events,
        })
    }

    fn create(&self, rig_type: &str) -> Option<Box<dyn ExecutableRig>> {
        let def = self.types.get(rig_type)?;
        Some(Box::new(DeclarativeRig::new(rig_type, Arc::clone(def))))
    }
}
