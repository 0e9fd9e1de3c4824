//! Executable rig abstraction.
//!
//! The [`ExecutableRig`] trait decouples the engine from whatever computes a
//! module's pose. The engine only schedules events, moves variable values and
//! hands out an [`ExecuteContext`]; tests use scripted rigs that record what
//! they were asked to do.

use std::fmt;

use crate::core::types::{Variable, VariableValue};
use crate::engine::context::ExecuteContext;

/// Per-module logic driven by the engine.
pub trait ExecutableRig: Send {
    /// Type identifier the rig was created from.
    fn rig_type(&self) -> &str;

    fn supported_events(&self) -> Vec<String>;

    fn supports_event(&self, event: &str) -> bool {
        self.supported_events().iter().any(|name| name == event)
    }

    /// Run `event`. Module logic talks to the engine only through `ctx`.
    fn execute(&mut self, event: &str, ctx: &mut ExecuteContext<'_>);

    fn requires_reinitialization(&self) -> bool {
        false
    }

    /// Reinitialize before running `event`; `false` skips the entry.
    fn reinitialize(&mut self, _event: &str) -> bool {
        true
    }

    fn public_variable(&self, name: &str) -> Option<Variable>;

    fn set_public_variable(&mut self, name: &str, value: VariableValue) -> Result<(), String>;

    /// Parse `raw` with the variable's current type and store it.
    fn set_variable_from_string(&mut self, name: &str, raw: &str) -> Result<(), String> {
        let current = self
            .public_variable(name)
            .ok_or_else(|| format!("unknown variable '{name}'"))?;
        let value = VariableValue::parse(current.ty, raw)?;
        self.set_public_variable(name, value)
    }

    /// Called once when the rig leaves the active graph.
    fn on_detached(&mut self) {}
}

/// What a factory knows about a type before instantiating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigCapabilities {
    /// Only module types can be composed into a modular rig.
    pub is_module: bool,
    pub events: Vec<String>,
}

/// Capability-tagged lookup from type identifier to rig constructor.
pub trait RigFactory: Send + Sync {
    fn describe(&self, rig_type: &str) -> Option<RigCapabilities>;

    fn create(&self, rig_type: &str) -> Option<Box<dyn ExecutableRig>>;
}

/// Identity of a rig object for the lifetime of its modular rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RigId(pub(crate) u64);

impl fmt::Display for RigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rig#{}", self.0)
    }
}
