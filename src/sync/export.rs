//! Progress export and import
//!
//! Exports word states and session history to JSON with optional
//! encryption. Imports reconcile each incoming state with the local one.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{debug, info};

use super::crypto::{decrypt_string, encrypt_string, hash_device_id, EncryptedData};
use super::merge::{resolve, MergeDecision};
use super::{ExportBundle, ExportMetadata};
use crate::storage::{SqliteStore, WordStore};

const FORMAT_VERSION: &str = "1.0";

/// Result of import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// States in the import file
    pub total: usize,
    /// States that had no local counterpart
    pub imported: usize,
    /// Local states replaced or refreshed
    pub updated: usize,
    /// Local states that won the merge
    pub kept: usize,
    /// States for words missing from the local catalog
    pub skipped: usize,
    pub sessions_imported: usize,
    pub source_device: String,
}

/// Export progress to a file, encrypting when a passphrase is given
pub fn export_progress(
    store: &SqliteStore,
    output_path: &Path,
    device: &str,
    passphrase: Option<&str>,
) -> Result<ExportMetadata> {
    let word_states = store.all_word_states()?;
    let sessions = store.all_sessions()?;

    if word_states.is_empty() && sessions.is_empty() {
        return Err(anyhow!("No progress to export"));
    }

    let metadata = ExportMetadata {
        version: FORMAT_VERSION.to_string(),
        exported_at: Utc::now().to_rfc3339(),
        source_device: hash_device_id(device),
        state_count: word_states.len(),
        session_count: sessions.len(),
        encrypted: passphrase.is_some(),
    };
    let bundle = ExportBundle {
        metadata: metadata.clone(),
        word_states,
        sessions,
    };

    let json = serde_json::to_string_pretty(&bundle)?;
    let content = match passphrase {
        Some(passphrase) => serde_json::to_string_pretty(&encrypt_string(&json, passphrase)?)?,
        None => json,
    };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output_path, content)?;

    info!(
        "Exported {} word states and {} sessions{} to {:?}",
        metadata.state_count,
        metadata.session_count,
        if metadata.encrypted { " (encrypted)" } else { "" },
        output_path
    );
    Ok(metadata)
}

/// Read a bundle, decrypting it if needed
pub fn read_bundle(input_path: &Path, passphrase: Option<&str>) -> Result<ExportBundle> {
    let content = std::fs::read_to_string(input_path)?;

    if let Ok(encrypted) = serde_json::from_str::<EncryptedData>(&content) {
        let passphrase = passphrase.ok_or_else(|| anyhow!("Passphrase required to decrypt {:?}", input_path))?;
        let decrypted = decrypt_string(&encrypted, passphrase)?;
        return Ok(serde_json::from_str(&decrypted)?);
    }

    Ok(serde_json::from_str(&content)?)
}

/// Merge a bundle into the local store
pub fn apply_bundle(store: &SqliteStore, bundle: &ExportBundle) -> Result<ImportResult> {
    let mut result = ImportResult {
        total: bundle.word_states.len(),
        source_device: bundle.metadata.source_device.clone(),
        ..ImportResult::default()
    };

    for remote in &bundle.word_states {
        if !store.has_word(&remote.word)? {
            debug!("Skip '{}': not in local catalog", remote.word);
            result.skipped += 1;
            continue;
        }

        let local = store.get_word_state(&remote.word)?;
        match resolve(local.as_ref(), remote) {
            MergeDecision::Import(state) => {
                store.put_word_state(&state)?;
                result.imported += 1;
            }
            MergeDecision::TakeRemote(state) | MergeDecision::Refresh(state) => {
                store.put_word_state(&state)?;
                result.updated += 1;
            }
            MergeDecision::Keep => result.kept += 1,
        }
    }

    for session in &bundle.sessions {
        if store.session_exists(&session.started_at)? {
            continue;
        }
        store.save_session(session)?;
        result.sessions_imported += 1;
    }

    Ok(result)
}

/// Import progress from a file
pub fn import_progress(store: &SqliteStore, input_path: &Path, passphrase: Option<&str>) -> Result<ImportResult> {
    let bundle = read_bundle(input_path, passphrase)?;
    info!(
        "Importing {} word states from {} (exported at {})",
        bundle.word_states.len(),
        bundle.metadata.source_device,
        bundle.metadata.exported_at
    );

    let result = apply_bundle(store, &bundle)?;
    info!(
        "Import result: {} imported, {} updated, {} kept, {} skipped, {} sessions",
        result.imported, result.updated, result.kept, result.skipped, result.sessions_imported
    );
    Ok(result)
}
