//! Storage module for wordloop
//!
//! The engine talks to durable storage only through the `WordStore`
//! trait. `SqliteStore` is the on-disk implementation used by the CLI.

use anyhow::Result;
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::models::{SessionSummary, StudyItem, WordState};

pub mod settings;
pub mod sqlite;

pub use settings::Settings;
pub use sqlite::SqliteStore;

/// Database file name inside the data directory
pub const DB_FILE: &str = "wordloop.sqlite";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Durable storage collaborator for the engine.
///
/// Every call fails fast; callers decide whether a failure is retryable.
pub trait WordStore {
    fn get_word_state(&self, word: &str) -> Result<Option<WordState>, StoreError>;

    /// Upsert keyed by word identity. Returns the state as persisted.
    fn save_word_state(&self, state: &WordState) -> Result<WordState, StoreError>;

    /// Words (optionally from one wordlist) with their states, in catalog order
    fn get_words_with_state(&self, wordlist: Option<&str>) -> Result<Vec<StudyItem>, StoreError>;

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Persist a session summary, returning its row id
    fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError>;
}

impl<T: WordStore + ?Sized> WordStore for &T {
    fn get_word_state(&self, word: &str) -> Result<Option<WordState>, StoreError> {
        (**self).get_word_state(word)
    }

    fn save_word_state(&self, state: &WordState) -> Result<WordState, StoreError> {
        (**self).save_word_state(state)
    }

    fn get_words_with_state(&self, wordlist: Option<&str>) -> Result<Vec<StudyItem>, StoreError> {
        (**self).get_words_with_state(wordlist)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_setting(key)
    }

    fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
        (**self).save_session(summary)
    }
}

/// Resolve the data directory.
///
/// `WORDLOOP_HOME` wins, then a `.wordloop` directory in the current
/// project, then `~/.wordloop`.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("WORDLOOP_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    let cwd = std::env::current_dir()?;
    let project_dir = cwd.join(".wordloop");
    if project_dir.exists() {
        return Ok(project_dir);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".wordloop"))
}

/// Path of the SQLite database inside the data directory
pub fn db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}
