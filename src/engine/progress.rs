//! Streak and weekly rollups over saved sessions

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::models::SessionSummary;

/// Days covered by the weekly rollup, counted back from today
const WEEK_DAYS: i64 = 7;

/// Totals for the sessions of the last week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub days_studied: usize,
    pub words: u32,
    pub average_accuracy: u32,
}

/// Consecutive days with at least one session, ending today.
///
/// A day without a session breaks the streak, so a gap yesterday
/// resets it even if today was studied.
pub fn study_streak(sessions: &[SessionSummary], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = sessions.iter().map(|s| s.date).collect();

    let mut streak = 0;
    for (offset, day) in days.iter().rev().enumerate() {
        if *day != today - Duration::days(offset as i64) {
            break;
        }
        streak += 1;
    }
    streak
}

pub fn week_summary(sessions: &[SessionSummary], today: NaiveDate) -> WeekSummary {
    let since = today - Duration::days(WEEK_DAYS);
    let week: Vec<&SessionSummary> = sessions.iter().filter(|s| s.date >= since).collect();
    if week.is_empty() {
        return WeekSummary::default();
    }

    let days: BTreeSet<NaiveDate> = week.iter().map(|s| s.date).collect();
    let accuracy_sum: u32 = week.iter().map(|s| s.spelling_accuracy).sum();
    WeekSummary {
        days_studied: days.len(),
        words: week.iter().map(|s| s.total_words).sum(),
        average_accuracy: (accuracy_sum as f64 / week.len() as f64).round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{SelfEvalTally, StudyMode};
    use chrono::Utc;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn session(date: &str, words: u32, accuracy: u32) -> SessionSummary {
        let now = Utc::now();
        SessionSummary {
            date: day(date),
            mode: StudyMode::All,
            started_at: now,
            ended_at: now,
            total_words: words,
            new_words: words,
            review_words: 0,
            spelling_correct: 0,
            spelling_wrong: 0,
            spelling_accuracy: accuracy,
            duration_secs: 60,
            hardest_word: None,
            mastered_new: 0,
            self_eval: SelfEvalTally::default(),
        }
    }

    #[test]
    fn test_streak_counts_back_from_today() {
        let sessions = vec![
            session("2024-03-10", 5, 100),
            session("2024-03-09", 5, 100),
            session("2024-03-09", 3, 50),
            session("2024-03-08", 5, 100),
            session("2024-03-05", 5, 100),
        ];
        assert_eq!(study_streak(&sessions, day("2024-03-10")), 3);
    }

    #[test]
    fn test_streak_is_zero_without_a_session_today() {
        let sessions = vec![session("2024-03-09", 5, 100), session("2024-03-08", 5, 100)];
        assert_eq!(study_streak(&sessions, day("2024-03-10")), 0);
        assert_eq!(study_streak(&[], day("2024-03-10")), 0);
    }

    #[test]
    fn test_week_summary_covers_last_seven_days() {
        let sessions = vec![
            session("2024-03-10", 10, 90),
            session("2024-03-10", 4, 75),
            session("2024-03-03", 6, 50),
            session("2024-03-02", 100, 0),
        ];
        let week = week_summary(&sessions, day("2024-03-10"));
        assert_eq!(week.days_studied, 2);
        assert_eq!(week.words, 20);
        // (90 + 75 + 50) / 3 = 71.67
        assert_eq!(week.average_accuracy, 72);
    }

    #[test]
    fn test_week_summary_empty() {
        let sessions = vec![session("2024-01-01", 10, 90)];
        assert_eq!(week_summary(&sessions, day("2024-03-10")), WeekSummary::default());
    }
}
