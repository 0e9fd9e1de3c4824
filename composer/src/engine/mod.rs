//! Runtime side of the composition engine.
//!
//! A [`ModularRig`] owns the instance tree built from a published
//! [`crate::core::model::ModuleGraphModel`] snapshot, the shared element
//! hierarchy and the execution queue. Module logic sees the engine only
//! through an [`ExecuteContext`].

pub mod context;
pub mod instance;
pub mod matching;
pub mod modular_rig;
pub mod rebuild;
pub mod registry;
pub mod resolve;
pub mod rig;
pub mod scheduler;
mod scope;

pub use context::{ExecuteContext, InteractionType, SharedContext};
pub use instance::{ConnectionRedirector, ModuleHandle, ModuleInstance, ResolvedBinding};
pub use matching::{ConnectorMatches, ResolveOutcome};
pub use modular_rig::{EngineSettings, ModularRig};
pub use rebuild::RebuildSummary;
pub use registry::ModuleRegistry;
pub use rig::{ExecutableRig, RigCapabilities, RigFactory, RigId};
pub use scheduler::{EntryState, ExecutionQueueEntry};
