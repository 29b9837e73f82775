//! # Engine Configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration:
//!
//! ```yaml
//! identity: wallet_pool        # or ed25519
//! wallet:
//!   pool_size: 20
//!   reserved: 2
//!   seed: default
//! cold_chain:
//!   min_temperature_centi_c: 200
//!   max_temperature_centi_c: 800
//!   min_humidity_centi_pct: 3000
//!   max_humidity_centi_pct: 7000
//! audit:
//!   capacity: 10000
//!   tracing: true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use prov_crypto::{WalletAssigner, WalletConfig};
use prov_state::SafeRange;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The document is not valid YAML for [`EngineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values parse but are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which [`IdentityResolver`](prov_crypto::IdentityResolver) assigns
/// identities at onboarding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    /// Deterministic address pool.
    #[default]
    WalletPool,
    /// Fresh Ed25519 key pair per organization.
    Ed25519,
}

/// Audit log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Maximum events held in memory.
    pub capacity: usize,
    /// Also emit every event as a `tracing` event.
    pub tracing: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            tracing: true,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identity backend used at onboarding.
    pub identity: IdentityBackend,
    /// Wallet pool (used by the `wallet_pool` backend and wallet previews).
    pub wallet: WalletConfig,
    /// Safe range for transit readings.
    pub cold_chain: SafeRange,
    /// Audit log settings.
    pub audit: AuditConfig,
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = &self.cold_chain;
        if range.min_temperature_centi_c > range.max_temperature_centi_c {
            return Err(ConfigError::Invalid(
                "cold_chain temperature minimum exceeds maximum".into(),
            ));
        }
        if range.min_humidity_centi_pct > range.max_humidity_centi_pct {
            return Err(ConfigError::Invalid(
                "cold_chain humidity minimum exceeds maximum".into(),
            ));
        }
        if self.audit.capacity == 0 {
            return Err(ConfigError::Invalid("audit capacity must be positive".into()));
        }
        WalletAssigner::new(&self.wallet).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
