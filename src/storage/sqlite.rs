//! SQLite-backed word store
//!
//! Holds the word catalog, per-word learning state, session history and
//! learner settings in a single database file.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use super::{StoreError, WordStore};
use crate::engine::models::{SelfEvalTally, SessionSummary, StudyItem, StudyMode, Word, WordState};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS wordlists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS words (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wordlist_id TEXT NOT NULL,
    word TEXT NOT NULL,
    meaning TEXT NOT NULL DEFAULT '',
    phonetic TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(wordlist_id, word),
    FOREIGN KEY (wordlist_id) REFERENCES wordlists(id) ON DELETE CASCADE
);

-- One row per word identity; dates are ISO strings so they compare lexicographically
CREATE TABLE IF NOT EXISTS word_state (
    word TEXT PRIMARY KEY,
    level INTEGER NOT NULL DEFAULT 0,
    last_seen_at TEXT,
    next_review_at TEXT,
    wrong_count INTEGER NOT NULL DEFAULT 0,
    correct_streak INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT NOT NULL,
    total_words INTEGER NOT NULL DEFAULT 0,
    new_words INTEGER NOT NULL DEFAULT 0,
    review_words INTEGER NOT NULL DEFAULT 0,
    spelling_correct INTEGER NOT NULL DEFAULT 0,
    spelling_wrong INTEGER NOT NULL DEFAULT 0,
    spelling_accuracy INTEGER NOT NULL DEFAULT 0,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    hardest_word TEXT,
    mastered_new INTEGER NOT NULL DEFAULT 0,
    self_eval TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_words_wordlist ON words(wordlist_id);
CREATE INDEX IF NOT EXISTS idx_words_word ON words(word);
CREATE INDEX IF NOT EXISTS idx_state_next_review ON word_state(next_review_at);
CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
"#;

/// A named source of words
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wordlist {
    pub id: String,
    pub name: String,
    pub word_count: i64,
}

/// Store backed by SQLite
pub struct SqliteStore {
    conn: Connection,
}

/// State columns as they come off the wire, before date parsing
struct StateRow {
    word: String,
    level: i64,
    last_seen_at: Option<String>,
    next_review_at: Option<String>,
    wrong_count: i64,
    correct_streak: i64,
    updated_at: Option<String>,
}

impl StateRow {
    fn into_state(self) -> Result<WordState, StoreError> {
        Ok(WordState {
            level: self.level.clamp(0, 3) as u8,
            last_seen_at: parse_timestamp(self.last_seen_at.as_deref())?,
            next_review_at: parse_date(self.next_review_at.as_deref())?,
            wrong_count: self.wrong_count.max(0) as u32,
            correct_streak: self.correct_streak.max(0) as u32,
            updated_at: parse_timestamp(self.updated_at.as_deref())?,
            word: self.word,
        })
    }
}

impl SqliteStore {
    /// Open or create a store at the given path and ensure the schema exists
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn)?;
        debug!("Opened word store at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Open store with write optimizations for study sessions
    pub fn open_write(db_path: &Path) -> Result<Self, StoreError> {
        let store = Self::open(db_path)?;
        store.conn.pragma_update(None, "journal_mode", "WAL")?;
        store.conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(store)
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    // ---- catalog ----

    pub fn create_wordlist(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO wordlists (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![id, name],
        )?;
        info!("Wordlist '{}' ready", id);
        Ok(())
    }

    pub fn list_wordlists(&self) -> Result<Vec<Wordlist>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT l.id, l.name, COUNT(w.id)
            FROM wordlists l
            LEFT JOIN words w ON w.wordlist_id = l.id
            GROUP BY l.id, l.name
            ORDER BY l.created_at, l.id
            "#,
        )?;

        let lists = stmt.query_map([], |row| {
            Ok(Wordlist {
                id: row.get(0)?,
                name: row.get(1)?,
                word_count: row.get(2)?,
            })
        })?;

        lists.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Append a word to a wordlist. Returns `None` if the list already had it.
    pub fn add_word(
        &self,
        wordlist_id: &str,
        text: &str,
        meaning: &str,
        phonetic: Option<&str>,
    ) -> Result<Option<i64>, StoreError> {
        let exists: bool = self
            .conn
            .query_row("SELECT 1 FROM wordlists WHERE id = ?1", params![wordlist_id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::NotFound(format!("wordlist '{}'", wordlist_id)));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::InvalidRecord("word text is empty".to_string()));
        }

        let changes = self.conn.execute(
            "INSERT OR IGNORE INTO words (wordlist_id, word, meaning, phonetic) VALUES (?1, ?2, ?3, ?4)",
            params![wordlist_id, text, meaning.trim(), phonetic],
        )?;

        if changes > 0 {
            Ok(Some(self.conn.last_insert_rowid()))
        } else {
            debug!("Word '{}' already in wordlist '{}'", text, wordlist_id);
            Ok(None)
        }
    }

    /// True if any wordlist contains this word identity
    pub fn has_word(&self, text: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM words WHERE word = ?1 LIMIT 1", params![text], |_| Ok(true))
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    // ---- word state ----

    /// Upsert a state exactly as given, keeping its `updated_at`
    pub fn put_word_state(&self, state: &WordState) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO word_state
            (word, level, last_seen_at, next_review_at, wrong_count, correct_streak, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(word) DO UPDATE SET
                level = excluded.level,
                last_seen_at = excluded.last_seen_at,
                next_review_at = excluded.next_review_at,
                wrong_count = excluded.wrong_count,
                correct_streak = excluded.correct_streak,
                updated_at = excluded.updated_at
            "#,
            params![
                state.word,
                state.level.min(3) as i64,
                state.last_seen_at.map(|t| t.to_rfc3339()),
                state.next_review_at.map(|d| d.format(DATE_FORMAT).to_string()),
                state.wrong_count as i64,
                state.correct_streak as i64,
                state.updated_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn all_word_states(&self) -> Result<Vec<WordState>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT word, level, last_seen_at, next_review_at, wrong_count, correct_streak, updated_at
            FROM word_state
            ORDER BY word
            "#,
        )?;
        let rows = stmt.query_map([], read_state_row)?;

        let mut states = Vec::new();
        for row in rows {
            states.push(row?.into_state()?);
        }
        Ok(states)
    }

    // ---- sessions ----

    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, mode, started_at, ended_at, total_words, new_words, review_words,
                   spelling_correct, spelling_wrong, spelling_accuracy, duration_secs,
                   hardest_word, mastered_new, self_eval
            FROM sessions
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                [
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                ],
                row.get::<_, i64>(10)?,
                row.get::<_, Option<String>>(11)?,
                row.get::<_, i64>(12)?,
                row.get::<_, String>(13)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (date, mode, started_at, ended_at, counts, duration_secs, hardest_word, mastered_new, self_eval) = row?;
            let [total_words, new_words, review_words, spelling_correct, spelling_wrong, spelling_accuracy] = counts;

            sessions.push(SessionSummary {
                date: parse_date(Some(&date))?
                    .ok_or_else(|| StoreError::InvalidRecord("session without date".into()))?,
                mode: mode
                    .parse::<StudyMode>()
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
                started_at: parse_required_timestamp(&started_at)?,
                ended_at: parse_required_timestamp(&ended_at)?,
                total_words: total_words as u32,
                new_words: new_words as u32,
                review_words: review_words as u32,
                spelling_correct: spelling_correct as u32,
                spelling_wrong: spelling_wrong as u32,
                spelling_accuracy: spelling_accuracy as u32,
                duration_secs,
                hardest_word,
                mastered_new: mastered_new as u32,
                self_eval: serde_json::from_str::<SelfEvalTally>(&self_eval)?,
            });
        }
        Ok(sessions)
    }

    /// Every saved session, newest first
    pub fn all_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.recent_sessions(i64::MAX as usize)
    }

    pub fn session_exists(&self, started_at: &DateTime<Utc>) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sessions WHERE started_at = ?1 LIMIT 1",
                params![started_at.to_rfc3339()],
                |_| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    pub fn session_count(&self) -> Result<i64, StoreError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    // ---- settings ----

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Write a setting only if it has no value yet
    pub fn seed_setting(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let changes = self.conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(changes > 0)
    }

    pub fn all_settings(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl WordStore for SqliteStore {
    fn get_word_state(&self, word: &str) -> Result<Option<WordState>, StoreError> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT word, level, last_seen_at, next_review_at, wrong_count, correct_streak, updated_at
                FROM word_state
                WHERE word = ?1
                "#,
                params![word],
                read_state_row,
            )
            .optional()?;

        row.map(StateRow::into_state).transpose()
    }

    fn save_word_state(&self, state: &WordState) -> Result<WordState, StoreError> {
        let mut stamped = state.clone();
        stamped.updated_at = Some(Utc::now());
        self.put_word_state(&stamped)?;
        Ok(stamped)
    }

    fn get_words_with_state(&self, wordlist: Option<&str>) -> Result<Vec<StudyItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT w.id, w.wordlist_id, w.word, w.meaning, w.phonetic,
                   s.word, s.level, s.last_seen_at, s.next_review_at, s.wrong_count,
                   s.correct_streak, s.updated_at
            FROM words w
            LEFT JOIN word_state s ON s.word = w.word
            WHERE ?1 IS NULL OR w.wordlist_id = ?1
            ORDER BY w.id
            "#,
        )?;

        let rows = stmt.query_map(params![wordlist], |row| {
            let word = Word {
                id: row.get(0)?,
                wordlist_id: row.get(1)?,
                text: row.get(2)?,
                meaning: row.get(3)?,
                phonetic: row.get(4)?,
            };
            let state = match row.get::<_, Option<String>>(5)? {
                Some(identity) => Some(StateRow {
                    word: identity,
                    level: row.get(6)?,
                    last_seen_at: row.get(7)?,
                    next_review_at: row.get(8)?,
                    wrong_count: row.get(9)?,
                    correct_streak: row.get(10)?,
                    updated_at: row.get(11)?,
                }),
                None => None,
            };
            Ok((word, state))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (word, state) = row?;
            items.push(StudyItem {
                word,
                state: state.map(StateRow::into_state).transpose()?,
            });
        }
        Ok(items)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn save_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (date, mode, started_at, ended_at, total_words, new_words, review_words,
             spelling_correct, spelling_wrong, spelling_accuracy, duration_secs,
             hardest_word, mastered_new, self_eval)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                summary.date.format(DATE_FORMAT).to_string(),
                summary.mode.as_str(),
                summary.started_at.to_rfc3339(),
                summary.ended_at.to_rfc3339(),
                summary.total_words,
                summary.new_words,
                summary.review_words,
                summary.spelling_correct,
                summary.spelling_wrong,
                summary.spelling_accuracy,
                summary.duration_secs,
                summary.hardest_word,
                summary.mastered_new,
                serde_json::to_string(&summary.self_eval)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

/// Create tables and indexes if they don't exist
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn read_state_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StateRow> {
    Ok(StateRow {
        word: row.get(0)?,
        level: row.get(1)?,
        last_seen_at: row.get(2)?,
        next_review_at: row.get(3)?,
        wrong_count: row.get(4)?,
        correct_streak: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            // Tolerate full timestamps written by older clients
            let day = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(day, DATE_FORMAT)
                .map_err(|e| StoreError::InvalidRecord(format!("bad date '{}': {}", s, e)))
        })
        .transpose()
}

fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.filter(|s| !s.is_empty())
        .map(parse_required_timestamp)
        .transpose()
}

fn parse_required_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_wordlist("core", "Core words").unwrap();
        store.create_wordlist("extra", "Extra words").unwrap();
        store.add_word("core", "apple", "a fruit", Some("/ˈæp.əl/")).unwrap();
        store.add_word("extra", "brisk", "quick", None).unwrap();
        store.add_word("core", "candle", "wax light", None).unwrap();
        store
    }

    fn studied(word: &str) -> WordState {
        WordState {
            level: 2,
            last_seen_at: Some(Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap()),
            next_review_at: NaiveDate::from_ymd_opt(2026, 2, 6),
            wrong_count: 1,
            correct_streak: 3,
            ..WordState::unseen(word)
        }
    }

    #[test]
    fn test_words_come_back_in_catalog_order() {
        let store = seeded();
        let items = store.get_words_with_state(None).unwrap();
        let texts: Vec<_> = items.iter().map(|i| i.word.text.as_str()).collect();
        assert_eq!(texts, vec!["apple", "brisk", "candle"]);
        assert!(items.iter().all(|i| i.state.is_none()));

        let core = store.get_words_with_state(Some("core")).unwrap();
        assert_eq!(core.len(), 2);
        assert_eq!(core[0].word.phonetic.as_deref(), Some("/ˈæp.əl/"));
    }

    #[test]
    fn test_state_round_trip_through_join() {
        let store = seeded();
        let saved = store.save_word_state(&studied("brisk")).unwrap();
        assert!(saved.updated_at.is_some());

        let fetched = store.get_word_state("brisk").unwrap().unwrap();
        assert_eq!(fetched, saved);

        let items = store.get_words_with_state(None).unwrap();
        assert_eq!(items[1].state.as_ref(), Some(&saved));
        assert!(store.get_word_state("apple").unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = seeded();
        store.save_word_state(&studied("apple")).unwrap();
        let mut next = studied("apple");
        next.level = 3;
        store.save_word_state(&next).unwrap();

        assert_eq!(store.get_word_state("apple").unwrap().unwrap().level, 3);
        assert_eq!(store.all_word_states().unwrap().len(), 1);
    }

    #[test]
    fn test_add_word_rules() {
        let store = seeded();
        assert!(store.add_word("core", "apple", "dup", None).unwrap().is_none());
        assert!(matches!(store.add_word("missing", "x", "", None), Err(StoreError::NotFound(_))));
        assert!(matches!(store.add_word("core", "  ", "", None), Err(StoreError::InvalidRecord(_))));
        assert!(store.has_word("candle").unwrap());
        assert!(!store.has_word("zebra").unwrap());

        let lists = store.list_wordlists().unwrap();
        assert_eq!(lists[0].word_count, 2);
    }

    #[test]
    fn test_session_round_trip() {
        let store = seeded();
        let started_at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let summary = SessionSummary {
            date: started_at.date_naive(),
            mode: StudyMode::Review,
            started_at,
            ended_at: Utc.with_ymd_and_hms(2026, 2, 1, 8, 10, 0).unwrap(),
            total_words: 4,
            new_words: 1,
            review_words: 3,
            spelling_correct: 3,
            spelling_wrong: 1,
            spelling_accuracy: 75,
            duration_secs: 600,
            hardest_word: Some("brisk".into()),
            mastered_new: 1,
            self_eval: SelfEvalTally { know: 2, fuzzy: 1, dont_know: 1 },
        };

        let id = store.save_session(&summary).unwrap();
        assert!(id > 0);
        assert!(store.session_exists(&started_at).unwrap());
        assert_eq!(store.recent_sessions(5).unwrap(), vec![summary]);
        assert_eq!(store.session_count().unwrap(), 1);
    }

    #[test]
    fn test_settings() {
        let store = seeded();
        assert!(store.seed_setting("relapseCap", "10").unwrap());
        assert!(!store.seed_setting("relapseCap", "99").unwrap());
        store.set_setting("relapseCap", "4").unwrap();
        assert_eq!(store.get_setting("relapseCap").unwrap().as_deref(), Some("4"));
        assert_eq!(store.all_settings().unwrap().len(), 1);
    }

    #[test]
    fn test_on_disk_store_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wordloop.sqlite");
        {
            let store = SqliteStore::open_write(&path).unwrap();
            store.create_wordlist("core", "Core").unwrap();
            store.add_word("core", "apple", "a fruit", None).unwrap();
            store.save_word_state(&studied("apple")).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_word_state("apple").unwrap().unwrap().level, 2);
    }

    #[test]
    fn test_legacy_timestamp_dates_are_truncated() {
        assert_eq!(
            parse_date(Some("2026-02-06T00:00:00Z")).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 6)
        );
        assert!(parse_date(Some("tomorrow")).is_err());
        assert_eq!(parse_date(None).unwrap(), None);
    }
}
