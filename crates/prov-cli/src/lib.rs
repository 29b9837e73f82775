//! # prov-cli: CLI Tool for the Provenance Engine
//!
//! ## Subcommands
//!
//! - `prov wallet`: preview pool identities for organization identifiers.
//! - `prov digest`: canonical SHA-256 digest of a JSON or YAML record.
//! - `prov replay`: run a scenario file against an in-process engine.
//!
//! ```bash
//! prov wallet assign mfr-1 dist-1
//! prov digest batch.json --expect sha256:...
//! prov --config engine.yaml replay scenarios/recall.yaml
//! ```

pub mod digest;
pub mod replay;
pub mod wallet;

use std::path::Path;

use anyhow::{Context, Result};

use prov_engine::EngineConfig;

/// Load the engine configuration from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration: {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Parse a JSON or YAML document, chosen by file extension.
pub(crate) fn read_document(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse YAML: {}", path.display()))
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse JSON: {}", path.display()))
    }
}
