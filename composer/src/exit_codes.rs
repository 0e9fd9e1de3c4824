//! Stable exit codes for composer CLI commands.

/// Command succeeded without warnings.
pub const OK: i32 = 0;
/// Invalid model, config or type library, or another hard error.
pub const INVALID: i32 = 1;
/// The command ran but the engine reported warnings or errors.
pub const DEGRADED: i32 = 2;
