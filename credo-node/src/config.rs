use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use credo_common::error::{CredoError, Result};
use credo_consensus::SyncConfig;
use credo_export::ExportConfig;
use credo_mint::MintConfig;
use credo_reconcile::ReconcileConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    /// Fixes every simulated outcome and the bundle signing key.
    pub seed: Option<u64>,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub reconcile_interval_ms: u64,
    pub mint: MintConfig,
    pub sync: SyncConfig,
    pub reconcile: ReconcileConfig,
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "data/credo".to_string(),
            seed: None,
            log_filter: "info,credo_node=debug".to_string(),
            reconcile_interval_ms: 5_000,
            mint: MintConfig::default(),
            sync: SyncConfig::default(),
            reconcile: ReconcileConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Every component with simulated latency switched off.
    pub fn deterministic(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            mint: MintConfig::deterministic(),
            sync: SyncConfig::deterministic(),
            reconcile: ReconcileConfig::deterministic(),
            export: ExportConfig::deterministic(),
            ..Self::default()
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&data)
            .map_err(|e| CredoError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            info!("⚠️ Config not found. Writing defaults to {}", path.as_ref().display());
            let config = Self::default();
            config.save_to_file(path)?;
            return Ok(config);
        }
        Self::load_from_file(path)
    }
}
