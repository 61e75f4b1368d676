//! Tracing setup shared by the core and the `doseline` binary.
//!
//! Everything is written to stderr: stdout carries command output only
//! (tables, CSV export, share links). `RUST_LOG` always wins over the
//! level picked here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `-v` count to a level: warn, info, debug, then trace.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the subscriber for a `-v` count.
///
/// The level applies to this workspace's crates; dependencies stay at warn.
pub fn init(verbosity: u8) {
    let level = level_for(verbosity);
    init_with_level(&format!("warn,doseline_core={level},doseline={level}"))
}

/// Install the subscriber with an explicit default filter directive
pub fn init_with_level(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Debug-level logging routed through the test harness
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
