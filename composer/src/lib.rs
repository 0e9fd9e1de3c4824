//! Composition and execution engine for modular rigs.
//!
//! Independently authored rig modules are assembled into one runtime graph,
//! their connectors are resolved to concrete hierarchy elements and their
//! per-event logic runs in breadth-first order, each module isolated in its
//! own element namespace. The crate is layered:
//!
//! - **[`core`]**: Pure, deterministic logic (naming, the module graph model,
//!   invariants, bindings, resolution bookkeeping, model editing).
//! - **[`engine`]**: The runtime (rebuild, scheduling, connector resolution).
//!   Never fails; problems are recorded as diagnostics.
//! - **[`io`]**: Side-effecting operations (config, model files, type library).
//!
//! [`library`] provides declarative rig types and [`session`] the orchestration
//! used by the CLI commands.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod library;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
