//! Engine configuration from the environment.
//!
//! `PERMGRAPH_TIE_BREAKER` selects the tie-breaker (`ANY_ALLOW` or
//! `ALL_ALLOW`, default `ANY_ALLOW`); backend variables are documented on
//! [`BackendConfig`].

use std::sync::Arc;

use permgraph_core::{GraphResult, TieBreakerPolicy};
use permgraph_infra::config::connect as connect_backend;
use permgraph_infra::{BackendConfig, ConfigError, GraphBackend};

use crate::engine::PermissionGraph;

pub const TIE_BREAKER_VAR: &str = "PERMGRAPH_TIE_BREAKER";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub tie_breaker_policy: TieBreakerPolicy,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = BackendConfig::from_lookup(&lookup)?;
        let tie_breaker_policy = match lookup(TIE_BREAKER_VAR) {
            None => TieBreakerPolicy::default(),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: TIE_BREAKER_VAR,
                value: raw.clone(),
            })?,
        };
        Ok(Self {
            backend,
            tie_breaker_policy,
        })
    }
}

impl PermissionGraph<Arc<dyn GraphBackend>> {
    /// Connect the configured backend and wrap it in an engine.
    pub async fn connect(config: &EngineConfig) -> GraphResult<Self> {
        let backend = connect_backend(&config.backend).await?;
        tracing::info!(policy = %config.tie_breaker_policy, "permission graph ready");
        Ok(Self::with_backend(backend, config.tie_breaker_policy))
    }
}
