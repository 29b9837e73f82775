//! # Application State
//!
//! The engine plus the server's own configuration. Cloned into every
//! handler; clones share the engine.

use metrics_exporter_prometheus::PrometheusHandle;

use prov_engine::{ConfigError, Engine, EngineConfig};

/// Server configuration, read from the environment by the binary.
#[derive(Clone, Default)]
pub struct AppConfig {
    /// Listen port (`PORT`, default 8080).
    pub port: u16,
    /// Shared bearer secret (`AUTH_TOKEN`). `None` disables the check.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: AppConfig,
    /// Renders `/metrics`. `None` when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the engine from `engine_config`.
    pub fn new(config: AppConfig, engine_config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_engine(config, Engine::new(engine_config)?))
    }

    /// Wrap an existing engine.
    pub fn with_engine(config: AppConfig, engine: Engine) -> Self {
        Self {
            engine,
            config,
            prometheus: None,
        }
    }

    /// Serve metrics from `handle`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}
