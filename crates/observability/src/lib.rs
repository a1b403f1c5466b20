//! Process-wide logging setup for permission graph hosts and tests.

/// Initialize structured JSON logging, filtered by `RUST_LOG`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber configuration (filters, formats).
pub mod tracing;

pub use tracing::init_for_tests;
