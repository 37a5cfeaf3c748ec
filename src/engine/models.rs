//! Core data model shared by the scheduler, task generator and session
//!
//! Dates that drive scheduling are calendar dates (`NaiveDate`) so that
//! comparisons are day-granular. Timestamps are UTC.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest mastery tier
pub const MAX_LEVEL: u8 = 3;

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    /// Insertion order across the whole catalog
    pub id: i64,
    pub wordlist_id: String,
    pub text: String,
    pub meaning: String,
    pub phonetic: Option<String>,
}

/// Per-learner learning state of one word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordState {
    /// Word identity (the word text)
    pub word: String,
    pub level: u8,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<NaiveDate>,
    pub wrong_count: u32,
    pub correct_streak: u32,
    /// Last durable write, only consulted when merging progress from another device
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WordState {
    /// Blank state for a word that has never been studied
    pub fn unseen(word: &str) -> Self {
        Self {
            word: word.to_string(),
            level: 0,
            last_seen_at: None,
            next_review_at: None,
            wrong_count: 0,
            correct_streak: 0,
            updated_at: None,
        }
    }
}

/// A word paired with its (possibly absent) state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyItem {
    pub word: Word,
    pub state: Option<WordState>,
}

/// Learner self-evaluation in the recall step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfEvaluation {
    Know,
    Fuzzy,
    DontKnow,
}

impl SelfEvaluation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelfEvaluation::Know => "know",
            SelfEvaluation::Fuzzy => "fuzzy",
            SelfEvaluation::DontKnow => "dont_know",
        }
    }

    /// Lenient parse used by the terminal UI; unknown labels yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "know" | "k" | "1" => Some(SelfEvaluation::Know),
            "fuzzy" | "f" | "2" => Some(SelfEvaluation::Fuzzy),
            "dont_know" | "dont-know" | "d" | "3" => Some(SelfEvaluation::DontKnow),
            _ => None,
        }
    }
}

impl fmt::Display for SelfEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which halves of the daily queue to populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    #[default]
    All,
    Review,
    New,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::All => "all",
            StudyMode::Review => "review",
            StudyMode::New => "new",
        }
    }
}

impl FromStr for StudyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "mixed" => Ok(StudyMode::All),
            "review" => Ok(StudyMode::Review),
            "new" => Ok(StudyMode::New),
            other => Err(anyhow::anyhow!("Unknown study mode '{}' (expected all, review or new)", other)),
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of one finished (or abandoned) sitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub date: NaiveDate,
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_words: u32,
    pub new_words: u32,
    pub review_words: u32,
    pub spelling_correct: u32,
    pub spelling_wrong: u32,
    pub spelling_accuracy: u32,
    pub duration_secs: i64,
    pub hardest_word: Option<String>,
    pub mastered_new: u32,
    pub self_eval: SelfEvalTally,
}

/// Count of each self-evaluation choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfEvalTally {
    pub know: u32,
    pub fuzzy: u32,
    pub dont_know: u32,
}

impl SelfEvalTally {
    pub fn record(&mut self, eval: SelfEvaluation) {
        match eval {
            SelfEvaluation::Know => self.know += 1,
            SelfEvaluation::Fuzzy => self.fuzzy += 1,
            SelfEvaluation::DontKnow => self.dont_know += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_evaluation_labels() {
        assert_eq!(SelfEvaluation::from_label("know"), Some(SelfEvaluation::Know));
        assert_eq!(SelfEvaluation::from_label(" F "), Some(SelfEvaluation::Fuzzy));
        assert_eq!(SelfEvaluation::from_label("dont_know"), Some(SelfEvaluation::DontKnow));
        assert_eq!(SelfEvaluation::from_label("maybe"), None);
    }

    #[test]
    fn test_self_evaluation_serde() {
        let json = serde_json::to_string(&SelfEvaluation::DontKnow).unwrap();
        assert_eq!(json, r#""dont_know""#);
    }

    #[test]
    fn test_study_mode_parse() {
        assert_eq!("review".parse::<StudyMode>().unwrap(), StudyMode::Review);
        assert_eq!("ALL".parse::<StudyMode>().unwrap(), StudyMode::All);
        assert!("later".parse::<StudyMode>().is_err());
    }

    #[test]
    fn test_tally_record() {
        let mut tally = SelfEvalTally::default();
        tally.record(SelfEvaluation::Fuzzy);
        tally.record(SelfEvaluation::Fuzzy);
        tally.record(SelfEvaluation::Know);
        assert_eq!(tally, SelfEvalTally { know: 1, fuzzy: 2, dont_know: 0 });
    }
}
