//! Sync module for cross-device progress exchange
//!
//! Progress travels as an `ExportBundle` (word states + session history),
//! optionally encrypted. Incoming word states are reconciled with local
//! ones through `merge::resolve`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::models::{SessionSummary, WordState};

pub mod crypto;
pub mod export;
pub mod merge;
pub mod mirror;

pub use export::{export_progress, import_progress, ImportResult};
pub use mirror::SessionMirror;

/// Sync config file name inside the data directory
pub const SYNC_CONFIG_FILE: &str = "sync.toml";
/// Progress file name inside the mirror directory
pub const PROGRESS_FILE: &str = "progress.json";

/// Configuration for sync operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether sync is enabled
    pub enabled: bool,
    /// Shared directory (cloud drive, network mount) other devices also see
    pub mirror_dir: Option<PathBuf>,
    /// Encrypt progress files pushed to the mirror
    pub encrypt: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mirror_dir: None,
            encrypt: true,
        }
    }
}

impl SyncConfig {
    /// Mirror directory when sync is enabled and configured
    pub fn active_mirror(&self) -> Option<&Path> {
        if self.enabled {
            self.mirror_dir.as_deref()
        } else {
            None
        }
    }
}

/// Export metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Export format version
    pub version: String,
    /// Export timestamp
    pub exported_at: String,
    /// Source device identifier (hashed)
    pub source_device: String,
    pub state_count: usize,
    pub session_count: usize,
    /// Whether data is encrypted
    pub encrypted: bool,
}

/// Complete export bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportBundle {
    pub metadata: ExportMetadata,
    pub word_states: Vec<WordState>,
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

/// Load sync configuration from file
pub fn load_sync_config(config_path: &Path) -> Result<SyncConfig> {
    if !config_path.exists() {
        return Ok(SyncConfig::default());
    }

    let content = std::fs::read_to_string(config_path)?;
    let config: SyncConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save sync configuration to file
pub fn save_sync_config(config: &SyncConfig, config_path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.enabled);
        assert!(config.encrypt);
        assert!(config.active_mirror().is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SYNC_CONFIG_FILE);

        assert_eq!(load_sync_config(&path).unwrap(), SyncConfig::default());

        let config = SyncConfig {
            enabled: true,
            mirror_dir: Some(temp.path().join("shared")),
            encrypt: false,
        };
        save_sync_config(&config, &path).unwrap();
        let loaded = load_sync_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.active_mirror(), Some(temp.path().join("shared").as_path()));
    }
}
