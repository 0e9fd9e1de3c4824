//! Deterministic, pure logic shared by the composition engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures (the module graph model, the element set, resolution
//! candidates) and return deterministic outputs suitable for tests.

pub mod bindings;
pub mod controller;
pub mod diagnostics;
pub mod display_path;
pub mod hierarchy;
pub mod invariants;
pub mod model;
pub mod namespace;
pub mod resolve;
pub mod types;
