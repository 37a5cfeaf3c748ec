//! Conflict resolution for incoming word states
//!
//! Higher mastery wins outright. At equal levels the more recently written
//! side wins the schedule, while counters are merged conservatively.

use crate::engine::models::WordState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local state: take the remote one as-is
    Import(WordState),
    /// Remote has the higher level: replace local entirely
    TakeRemote(WordState),
    /// Same level, remote newer: take its schedule, merge counters
    Refresh(WordState),
    /// Local stays
    Keep,
}

pub fn resolve(local: Option<&WordState>, remote: &WordState) -> MergeDecision {
    let Some(local) = local else {
        return MergeDecision::Import(remote.clone());
    };

    if remote.level > local.level {
        return MergeDecision::TakeRemote(remote.clone());
    }

    // Missing timestamps count as oldest
    let remote_newer = match (remote.updated_at, local.updated_at) {
        (Some(r), Some(l)) => r > l,
        (Some(_), None) => true,
        _ => false,
    };

    if remote.level == local.level && remote_newer {
        return MergeDecision::Refresh(WordState {
            word: local.word.clone(),
            level: local.level,
            last_seen_at: remote.last_seen_at,
            next_review_at: remote.next_review_at,
            wrong_count: remote.wrong_count.min(local.wrong_count),
            correct_streak: remote.correct_streak.max(local.correct_streak),
            updated_at: remote.updated_at,
        });
    }

    MergeDecision::Keep
}
