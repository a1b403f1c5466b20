//! Tracing subscriber initialization.
//!
//! The engine and backends only emit events; installing a subscriber is left
//! to whatever hosts them.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize tracing for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(DEFAULT_DIRECTIVE))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Human-readable logs routed through the test harness's captured output.
///
/// Quiet unless `RUST_LOG` is set, so passing tests stay silent.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("off"))
        .with_test_writer()
        .compact()
        .try_init();
}
