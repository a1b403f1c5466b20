//! Backend selection and connection settings.
//!
//! Read from the environment:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `PERMGRAPH_BACKEND` | `memory` or `postgres` | `memory` |
//! | `DATABASE_URL` | Postgres connection string | required for `postgres` |
//! | `PERMGRAPH_MAX_CONNECTIONS` | pool size | `5` |

use std::sync::Arc;

use thiserror::Error;

use permgraph_core::GraphError;

use crate::graph_store::{GraphBackend, InMemoryGraphBackend, PostgresGraphBackend};

pub const BACKEND_VAR: &str = "PERMGRAPH_BACKEND";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "PERMGRAPH_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown backend '{0}' (expected 'memory' or 'postgres')")]
    UnknownBackend(String),

    #[error("{0} must be set for the postgres backend")]
    MissingDatabaseUrl(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Which graph backend to construct.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum BackendConfig {
    #[default]
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

// Keeps credentials in the connection string out of logs.
impl core::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BackendConfig::InMemory => f.write_str("InMemory"),
            BackendConfig::Postgres {
                max_connections, ..
            } => f
                .debug_struct("Postgres")
                .field("database_url", &"<redacted>")
                .field("max_connections", max_connections)
                .finish(),
        }
    }
}

impl BackendConfig {
    pub fn postgres(database_url: impl Into<String>) -> Self {
        BackendConfig::Postgres {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup(BACKEND_VAR).unwrap_or_else(|| "memory".to_string());
        match backend.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(BackendConfig::InMemory),
            "postgres" | "postgresql" => {
                let database_url = lookup(DATABASE_URL_VAR)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::MissingDatabaseUrl(DATABASE_URL_VAR))?;
                let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
                    None => DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => raw
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ConfigError::InvalidValue {
                            var: MAX_CONNECTIONS_VAR,
                            value: raw,
                        })?,
                };
                Ok(BackendConfig::Postgres {
                    database_url,
                    max_connections,
                })
            }
            _ => Err(ConfigError::UnknownBackend(backend)),
        }
    }
}

/// Construct the configured backend.
///
/// The Postgres backend is connected and its schema bootstrapped before it is
/// returned.
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn GraphBackend>, GraphError> {
    match config {
        BackendConfig::InMemory => {
            tracing::info!("using in-memory graph backend");
            Ok(Arc::new(InMemoryGraphBackend::new()))
        }
        BackendConfig::Postgres {
            database_url,
            max_connections,
        } => {
            tracing::info!(max_connections, "using postgres graph backend");
            let backend = PostgresGraphBackend::connect(database_url, *max_connections).await?;
            backend.init_schema().await?;
            Ok(Arc::new(backend))
        }
    }
}
