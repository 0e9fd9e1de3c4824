//! Development-time tracing for the composer.
//!
//! Engine diagnostics are mirrored to `tracing` as they are recorded; this
//! module only decides where that output goes. Command output (module
//! trees, queues, matches) is printed to stdout by the CLI and is not
//! affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, so engine warnings reach
/// stderr without extra flags.
///
/// # Example
/// ```bash
/// RUST_LOG=composer=debug composer run rig.json --types types.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
