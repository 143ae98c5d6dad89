//! Tracing subscriber setup for binaries and test harnesses
//!
//! The library itself only emits `tracing` events; embedders call `init`
//! once at startup. `RUST_LOG` overrides the default directive.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; safe to call more than once
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
