//! Log output setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a `fmt` subscriber for the process.
///
/// The filter comes from, in order: `MERIDIAN_LOG`, `RUST_LOG`, then
/// `"info"`. Safe to call more than once; later calls do nothing.
pub fn init() {
    let filter = std::env::var("MERIDIAN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).try_init().ok();
}
