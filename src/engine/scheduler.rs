//! Spaced-repetition scheduler
//!
//! Level system:
//!   L0 = unfamiliar, L1 = recognized, L2 = proficient, L3 = mastered
//!
//! Review intervals by level:
//!   L0: +1 day, L1: +2 days, L2: +5 days, L3: +10 days
//!
//! The recall step only proposes an earlier review date. The spelling
//! step is the only place where the level moves (+1 correct, -1 wrong).

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::models::{SelfEvaluation, WordState, MAX_LEVEL};

/// Interval in days, indexed by level
const INTERVALS: [u64; 4] = [1, 2, 5, 10];

const LEVEL_NAMES: [&str; 4] = ["unfamiliar", "recognized", "proficient", "mastered"];

/// Result of the recall step, consumed by the spelling step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecallOutcome {
    pub triggers_relapse: bool,
    pub suggested_review_date: Option<NaiveDate>,
}

pub fn level_name(level: u8) -> &'static str {
    LEVEL_NAMES.get(level as usize).copied().unwrap_or("unknown")
}

/// Next review date for a level, counted from `today`
pub fn compute_next_review_date(level: u8, today: NaiveDate) -> NaiveDate {
    let days = INTERVALS.get(level as usize).copied().unwrap_or(INTERVALS[0]);
    add_days(today, days)
}

/// True iff the word has a review date and it has arrived
pub fn is_due(state: Option<&WordState>, today: NaiveDate) -> bool {
    matches!(state.and_then(|s| s.next_review_at), Some(next) if next <= today)
}

/// True iff the word has never been studied
pub fn is_new(state: Option<&WordState>) -> bool {
    state.map_or(true, |s| s.last_seen_at.is_none())
}

/// Meaning recall. Never touches the level.
pub fn process_recall_step(
    _state: Option<&WordState>,
    eval: SelfEvaluation,
    today: NaiveDate,
) -> RecallOutcome {
    let tomorrow = add_days(today, 1);
    match eval {
        SelfEvaluation::Know => RecallOutcome::default(),
        SelfEvaluation::Fuzzy => RecallOutcome {
            triggers_relapse: false,
            suggested_review_date: Some(tomorrow),
        },
        SelfEvaluation::DontKnow => RecallOutcome {
            triggers_relapse: true,
            suggested_review_date: Some(tomorrow),
        },
    }
}

/// Spelling step: the only mutator of `level`.
///
/// An absent state is treated as a fresh level-0 word. The recall outcome
/// can only pull the review date earlier, never push it later.
pub fn process_spell_step(
    word: &str,
    state: Option<&WordState>,
    correct: bool,
    recall: Option<&RecallOutcome>,
    now: DateTime<Utc>,
) -> WordState {
    let mut next = state.cloned().unwrap_or_else(|| WordState::unseen(word));
    let level = next.level.min(MAX_LEVEL);

    if correct {
        next.level = (level + 1).min(MAX_LEVEL);
        next.correct_streak = next.correct_streak.saturating_add(1);
    } else {
        next.level = level.saturating_sub(1);
        next.wrong_count = next.wrong_count.saturating_add(1);
        next.correct_streak = 0;
    }

    next.last_seen_at = Some(now);

    let by_level = compute_next_review_date(next.level, now.date_naive());
    next.next_review_at = Some(match recall.and_then(|r| r.suggested_review_date) {
        Some(suggested) => suggested.min(by_level),
        None => by_level,
    });

    next
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
