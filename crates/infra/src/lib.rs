//! Infrastructure layer: graph storage backends and their configuration.

pub mod config;
pub mod graph_store;

pub use config::{BackendConfig, ConfigError};
pub use graph_store::{GraphBackend, InMemoryGraphBackend, PostgresGraphBackend};
