//! Learner settings
//!
//! Stored as key/value rows in the `settings` table. Missing or unparsable
//! values fall back to defaults instead of failing.

use serde::Serialize;
use tracing::warn;

use super::{StoreError, WordStore};
use crate::engine::tasks::TaskConfig;

pub const DAILY_NEW_WORDS: &str = "dailyNewWords";
pub const DAILY_REVIEW_CAP: &str = "dailyReviewCap";
pub const RELAPSE_CAP: &str = "relapseCap";
pub const ACTIVE_WORDLIST_ID: &str = "activeWordlistId";

pub const DEFAULT_DAILY_NEW_WORDS: usize = 10;
pub const DEFAULT_DAILY_REVIEW_CAP: usize = 50;
pub const DEFAULT_RELAPSE_CAP: usize = 10;

/// All keys the CLI accepts in `config set`
pub const KNOWN_KEYS: [&str; 4] = [DAILY_NEW_WORDS, DAILY_REVIEW_CAP, RELAPSE_CAP, ACTIVE_WORDLIST_ID];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub daily_new_words: usize,
    pub daily_review_cap: usize,
    pub relapse_cap: usize,
    pub active_wordlist_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daily_new_words: DEFAULT_DAILY_NEW_WORDS,
            daily_review_cap: DEFAULT_DAILY_REVIEW_CAP,
            relapse_cap: DEFAULT_RELAPSE_CAP,
            active_wordlist_id: None,
        }
    }
}

impl Settings {
    /// Load settings through the store, applying defaults
    pub fn load<S: WordStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let active_wordlist_id = store
            .get_setting(ACTIVE_WORDLIST_ID)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            daily_new_words: read_count(store, DAILY_NEW_WORDS, DEFAULT_DAILY_NEW_WORDS)?,
            daily_review_cap: read_count(store, DAILY_REVIEW_CAP, DEFAULT_DAILY_REVIEW_CAP)?,
            relapse_cap: read_count(store, RELAPSE_CAP, DEFAULT_RELAPSE_CAP)?,
            active_wordlist_id,
        })
    }

    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            daily_new_cap: self.daily_new_words,
            daily_review_cap: self.daily_review_cap,
            active_wordlist: self.active_wordlist_id.clone(),
        }
    }

    /// Default rows written by `init`
    pub fn default_rows() -> Vec<(&'static str, String)> {
        vec![
            (DAILY_NEW_WORDS, DEFAULT_DAILY_NEW_WORDS.to_string()),
            (DAILY_REVIEW_CAP, DEFAULT_DAILY_REVIEW_CAP.to_string()),
            (RELAPSE_CAP, DEFAULT_RELAPSE_CAP.to_string()),
        ]
    }
}

/// Read a non-negative count setting, falling back to `default`
pub fn read_count<S: WordStore + ?Sized>(store: &S, key: &str, default: usize) -> Result<usize, StoreError> {
    match store.get_setting(key)? {
        None => Ok(default),
        Some(raw) => Ok(parse_count(key, &raw, default)),
    }
}

fn parse_count(key: &str, raw: &str, default: usize) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Setting {} has invalid value {:?}, using default {}", key, raw, default);
            default
        }
    }
}

/// Validate a value before `config set` writes it
pub fn validate(key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        DAILY_NEW_WORDS | DAILY_REVIEW_CAP | RELAPSE_CAP => {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", key, value))?;
            Ok(())
        }
        ACTIVE_WORDLIST_ID => Ok(()),
        other => Err(anyhow::anyhow!(
            "Unknown setting '{}'. Known settings: {}",
            other,
            KNOWN_KEYS.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[test]
    fn test_defaults_when_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let settings = Settings::load(&store).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.relapse_cap, 10);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_setting(DAILY_NEW_WORDS, "lots").unwrap();
        store.set_setting(DAILY_REVIEW_CAP, "20").unwrap();
        store.set_setting(ACTIVE_WORDLIST_ID, "  ").unwrap();

        let settings = Settings::load(&store).unwrap();
        assert_eq!(settings.daily_new_words, DEFAULT_DAILY_NEW_WORDS);
        assert_eq!(settings.daily_review_cap, 20);
        assert_eq!(settings.active_wordlist_id, None);
    }

    #[test]
    fn test_task_config_mapping() {
        let settings = Settings {
            daily_new_words: 3,
            daily_review_cap: 7,
            relapse_cap: 1,
            active_wordlist_id: Some("gre".into()),
        };
        let config = settings.task_config();
        assert_eq!(config.daily_new_cap, 3);
        assert_eq!(config.daily_review_cap, 7);
        assert_eq!(config.active_wordlist.as_deref(), Some("gre"));
    }

    #[test]
    fn test_validate() {
        assert!(validate(RELAPSE_CAP, "4").is_ok());
        assert!(validate(RELAPSE_CAP, "-1").is_err());
        assert!(validate(ACTIVE_WORDLIST_ID, "toefl").is_ok());
        assert!(validate("ttsRate", "1").is_err());
    }
}
