//! Session mirror
//!
//! Every finished session is dropped as its own JSON file under
//! `<mirror_dir>/sessions/`, so devices sharing the directory never
//! contend for one file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::engine::models::SessionSummary;
use crate::engine::session::SessionReplicator;

const SESSIONS_DIR: &str = "sessions";

pub struct SessionMirror {
    dir: PathBuf,
}

impl SessionMirror {
    pub fn new(mirror_dir: &Path) -> Self {
        Self {
            dir: mirror_dir.join(SESSIONS_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, summary: &SessionSummary) -> PathBuf {
        let stamp = summary.started_at.format("%Y%m%dT%H%M%S%.3fZ").to_string();
        self.dir.join(format!("{}-{}.json", stamp, summary.mode))
    }

    /// Read every mirrored session, oldest first. Unreadable files are skipped.
    pub fn read_sessions(&self) -> Result<Vec<SessionSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut sessions = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| serde_json::from_str::<SessionSummary>(&content).map_err(Into::into));
            match parsed {
                Ok(summary) => sessions.push(summary),
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }
        Ok(sessions)
    }
}

impl SessionReplicator for SessionMirror {
    fn push_session(&self, summary: &SessionSummary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create mirror directory {:?}", self.dir))?;

        let path = self.file_for(summary);
        std::fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        debug!("Mirrored session to {:?}", path);
        Ok(())
    }
}
