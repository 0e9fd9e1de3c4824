//! I/O helpers for composer commands.

pub mod config;
pub mod init;
pub mod model_store;
pub mod type_library;
