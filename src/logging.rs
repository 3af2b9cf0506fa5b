//! Tracing subscriber setup for the command-line tool.
//!
//! The library only emits `tracing` events; binaries decide where they go.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for a verbosity level.
///
/// `quiet` wins over any verbosity and keeps only errors.
#[must_use]
pub fn verbosity_filter(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install a stderr fmt subscriber.
///
/// `RUST_LOG`, when set, overrides the verbosity-derived filter.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity: u8, quiet: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbosity, quiet)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
}
