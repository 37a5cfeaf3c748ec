//! Study session manager
//!
//! Owns the live progression through one sitting:
//! - the main queue (append-only) with an index cursor
//! - a bounded relapse FIFO for failed words
//! - recall → spelling sequencing per item
//! - statistics for the end-of-session report
//!
//! Word state is always re-read from the store before a step touches it,
//! and written back after every spelling verdict. Analytics and session
//! mirroring are best-effort; the word-state write is not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::{EventSink, NullSink, StudyEvent};
use super::models::{
    SelfEvalTally, SelfEvaluation, SessionSummary, StudyItem, StudyMode, Word, WordState, MAX_LEVEL,
};
use super::scheduler::{is_new, process_recall_step, process_spell_step, RecallOutcome};
use super::tasks::DailyTasks;
use crate::storage::settings::{read_count, DEFAULT_RELAPSE_CAP, RELAPSE_CAP};
use crate::storage::{StoreError, WordStore};

/// Source of the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cross-device push of finished sessions. Called only after the durable
/// save succeeded; failures are logged and dropped.
pub trait SessionReplicator {
    fn push_session(&self, summary: &SessionSummary) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Recall,
    Spell,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Recall => f.write_str("recall"),
            Step::Spell => f.write_str("spell"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("No current item: the session is complete")]
    NoCurrentItem,

    #[error("Expected the {expected} step, but the session is at the {actual} step")]
    WrongStep { expected: Step, actual: Step },

    #[error("The current item has no spelling verdict yet")]
    StepIncomplete,
}

/// One entry of the session queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQueueItem {
    pub word: Word,
    pub state: Option<WordState>,
    /// Re-inserted after a failure; never re-enters the relapse queue
    pub is_relapse_copy: bool,
}

impl From<StudyItem> for SessionQueueItem {
    fn from(item: StudyItem) -> Self {
        Self {
            word: item.word,
            state: item.state,
            is_relapse_copy: false,
        }
    }
}

/// What the UI should show right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentItem {
    pub word: Word,
    pub state: Option<WordState>,
    pub step: Step,
    /// 1-based position in the (growing) queue
    pub progress: usize,
    pub total: usize,
    pub is_relapse: bool,
}

/// Feedback for the UI after a spelling verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpellFeedback {
    pub correct: bool,
    pub correct_answer: String,
    pub old_level: u8,
    pub new_level: u8,
    pub relapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelChange {
    pub word: String,
    pub from: u8,
    pub to: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub total_words: u32,
    pub new_words: u32,
    pub review_words: u32,
    pub spelling_correct: u32,
    pub spelling_wrong: u32,
    pub self_eval: SelfEvalTally,
    pub level_changes: Vec<LevelChange>,
    pub hardest_word: Option<String>,
    pub hardest_word_errors: u32,
}

/// Immutable end-of-session snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub stats: SessionStats,
    /// Rounded percentage, 0 when nothing was spelled
    pub spelling_accuracy: u32,
    /// Level changes that landed on the top tier
    pub mastered_new: u32,
    pub relapse_count: usize,
}

impl SessionReport {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            date: self.started_at.date_naive(),
            mode: self.mode,
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_words: self.stats.total_words,
            new_words: self.stats.new_words,
            review_words: self.stats.review_words,
            spelling_correct: self.stats.spelling_correct,
            spelling_wrong: self.stats.spelling_wrong,
            spelling_accuracy: self.spelling_accuracy,
            duration_secs: self.duration_secs,
            hardest_word: self.stats.hardest_word.clone(),
            mastered_new: self.mastered_new,
            self_eval: self.stats.self_eval,
        }
    }
}

pub struct StudySession<S: WordStore> {
    store: S,
    events: Box<dyn EventSink>,
    replicator: Option<Box<dyn SessionReplicator>>,
    clock: Box<dyn Clock>,
    mode: StudyMode,

    queue: Vec<SessionQueueItem>,
    relapse_queue: VecDeque<SessionQueueItem>,
    relapse_cap: usize,
    relapse_count: usize,

    current_index: usize,
    current_step: Step,
    recall_outcome: Option<RecallOutcome>,
    spelled: bool,

    stats: SessionStats,
    error_counts: HashMap<String, u32>,
    started_at: DateTime<Utc>,
    complete: bool,
    saved: bool,
}

impl<S: WordStore> StudySession<S> {
    pub fn new(tasks: DailyTasks, mode: StudyMode, store: S) -> Self {
        let clock: Box<dyn Clock> = Box::new(SystemClock);
        let started_at = clock.now();
        Self {
            store,
            events: Box::new(NullSink),
            replicator: None,
            clock,
            mode,
            queue: tasks.queue.into_iter().map(SessionQueueItem::from).collect(),
            relapse_queue: VecDeque::new(),
            relapse_cap: DEFAULT_RELAPSE_CAP,
            relapse_count: 0,
            current_index: 0,
            current_step: Step::Recall,
            recall_outcome: None,
            spelled: false,
            stats: SessionStats::default(),
            error_counts: HashMap::new(),
            started_at,
            complete: false,
            saved: false,
        }
    }

    pub fn with_events(mut self, events: Box<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_replicator(mut self, replicator: Box<dyn SessionReplicator>) -> Self {
        self.replicator = Some(replicator);
        self
    }

    /// Replace the clock; also restarts the session timer
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.started_at = clock.now();
        self.clock = clock;
        self
    }

    /// Read the relapse cap from settings
    pub fn init(&mut self) -> Result<(), SessionError> {
        self.relapse_cap = read_count(&self.store, RELAPSE_CAP, DEFAULT_RELAPSE_CAP)?;
        self.events.track(&StudyEvent::SessionStarted {
            mode: self.mode,
            queued: self.queue.len(),
        });
        info!(
            "Study session started: {} words queued, relapse cap {}",
            self.queue.len(),
            self.relapse_cap
        );
        Ok(())
    }

    pub fn relapse_cap(&self) -> usize {
        self.relapse_cap
    }

    pub fn relapse_count(&self) -> usize {
        self.relapse_count
    }

    pub fn pending_relapses(&self) -> usize {
        self.relapse_queue.len()
    }

    pub fn current_step(&self) -> Step {
        self.current_step
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Current item, pulling the next relapse into the queue once the
    /// cursor runs past the end. Returns `None` when the session is complete.
    pub fn get_current_item(&mut self) -> Option<CurrentItem> {
        if self.current_index >= self.queue.len() {
            match self.relapse_queue.pop_front() {
                Some(relapse) => {
                    debug!("Re-presenting relapsed word '{}'", relapse.word.text);
                    self.queue.push(relapse);
                }
                None => {
                    if !self.complete {
                        info!("Study session complete after {} spelling passes", self.stats.total_words);
                    }
                    self.complete = true;
                    return None;
                }
            }
        }

        let item = &self.queue[self.current_index];
        Some(CurrentItem {
            word: item.word.clone(),
            state: item.state.clone(),
            step: self.current_step,
            progress: self.current_index + 1,
            total: self.queue.len(),
            is_relapse: item.is_relapse_copy,
        })
    }

    fn current(&self) -> Result<&SessionQueueItem, SessionError> {
        self.queue.get(self.current_index).ok_or(SessionError::NoCurrentItem)
    }

    fn expect_step(&self, expected: Step) -> Result<(), SessionError> {
        if self.current_step != expected {
            return Err(SessionError::WrongStep {
                expected,
                actual: self.current_step,
            });
        }
        Ok(())
    }

    /// Meaning recall self-evaluation. Never changes the level.
    pub fn handle_recall(&mut self, eval: SelfEvaluation) -> Result<RecallOutcome, SessionError> {
        self.expect_step(Step::Recall)?;
        let word = self.current()?.word.text.clone();

        let state = self.store.get_word_state(&word)?;
        let outcome = process_recall_step(state.as_ref(), eval, self.clock.now().date_naive());

        self.recall_outcome = Some(outcome);
        self.stats.self_eval.record(eval);
        self.events.track(&StudyEvent::SelfEvaluated { word, choice: eval });

        self.current_step = Step::Spell;
        Ok(outcome)
    }

    /// Spelling verdict: updates level and schedule, persists the state,
    /// and queues a relapse when needed.
    pub fn handle_spell(&mut self, correct: bool) -> Result<SpellFeedback, SessionError> {
        self.expect_step(Step::Spell)?;
        let (word, is_relapse_copy, was_new) = {
            let item = self.current()?;
            (item.word.text.clone(), item.is_relapse_copy, is_new(item.state.as_ref()))
        };

        let state = self.store.get_word_state(&word)?;
        let old_level = state.as_ref().map_or(0, |s| s.level.min(MAX_LEVEL));
        let next = process_spell_step(
            &word,
            state.as_ref(),
            correct,
            self.recall_outcome.as_ref(),
            self.clock.now(),
        );

        // Nothing below runs unless the write went through
        let persisted = self.store.save_word_state(&next)?;
        let new_level = persisted.level;

        if let Some(item) = self.queue.get_mut(self.current_index) {
            item.state = Some(persisted.clone());
        }

        self.stats.total_words += 1;
        if !is_relapse_copy {
            if was_new {
                self.stats.new_words += 1;
            } else {
                self.stats.review_words += 1;
            }
        }

        if correct {
            self.stats.spelling_correct += 1;
        } else {
            self.stats.spelling_wrong += 1;
            let errors = self.error_counts.entry(word.clone()).or_insert(0);
            *errors += 1;
            if *errors > self.stats.hardest_word_errors {
                self.stats.hardest_word = Some(word.clone());
                self.stats.hardest_word_errors = *errors;
            }
        }

        if old_level != new_level {
            self.stats.level_changes.push(LevelChange {
                word: word.clone(),
                from: old_level,
                to: new_level,
            });
            self.events.track(&StudyEvent::LevelChanged {
                word: word.clone(),
                from: old_level,
                to: new_level,
            });
        }

        let triggers_relapse = self.recall_outcome.map_or(false, |r| r.triggers_relapse);
        let mut relapsed = false;
        if (!correct || triggers_relapse) && self.relapse_count < self.relapse_cap && !is_relapse_copy {
            if let Some(item) = self.queue.get(self.current_index) {
                self.relapse_queue.push_back(SessionQueueItem {
                    word: item.word.clone(),
                    state: Some(persisted.clone()),
                    is_relapse_copy: true,
                });
                self.relapse_count += 1;
                relapsed = true;
                debug!(
                    "Queued relapse for '{}' ({}/{})",
                    word, self.relapse_count, self.relapse_cap
                );
            }
        }

        self.events.track(&StudyEvent::SpellingSubmitted {
            word: word.clone(),
            correct,
        });
        self.spelled = true;

        Ok(SpellFeedback {
            correct,
            correct_answer: word,
            old_level,
            new_level,
            relapsed,
        })
    }

    /// Move to the next item once both steps of the current one are done
    pub fn advance(&mut self) -> Result<(), SessionError> {
        if !self.spelled {
            return Err(SessionError::StepIncomplete);
        }
        self.current_index += 1;
        self.current_step = Step::Recall;
        self.recall_outcome = None;
        self.spelled = false;
        Ok(())
    }

    pub fn report(&self) -> SessionReport {
        let ended_at = self.clock.now();
        let attempts = self.stats.spelling_correct + self.stats.spelling_wrong;
        let spelling_accuracy = if attempts > 0 {
            ((self.stats.spelling_correct as f64 / attempts as f64) * 100.0).round() as u32
        } else {
            0
        };
        let mastered_new = self
            .stats
            .level_changes
            .iter()
            .filter(|c| c.to == MAX_LEVEL)
            .count() as u32;

        SessionReport {
            mode: self.mode,
            started_at: self.started_at,
            ended_at,
            duration_secs: (ended_at - self.started_at).num_seconds().max(0),
            stats: self.stats.clone(),
            spelling_accuracy,
            mastered_new,
            relapse_count: self.relapse_count,
        }
    }

    /// Persist the session summary exactly once.
    ///
    /// Returns the new row id, or `None` if the session was already saved.
    /// A failed durable write is returned and may be retried.
    pub fn save_session(&mut self) -> Result<Option<i64>, SessionError> {
        if self.saved {
            debug!("Session already saved, skipping");
            return Ok(None);
        }

        let summary = self.report().summary();
        let id = self.store.save_session(&summary)?;
        self.saved = true;
        info!(
            "Saved session {}: {} words, {}% spelling accuracy",
            id, summary.total_words, summary.spelling_accuracy
        );

        if let Some(replicator) = &self.replicator {
            if let Err(e) = replicator.push_session(&summary) {
                warn!("Session mirror push failed: {}", e);
            }
        }
        self.events.track(&StudyEvent::SessionCompleted { summary });

        Ok(Some(id))
    }

    /// Leave early: flush a partial summary if anything was studied,
    /// otherwise discard silently. Never fails.
    pub fn abandon(&mut self) -> Option<i64> {
        if self.stats.total_words == 0 {
            debug!("Abandoned session had no spelling passes, discarding");
            return None;
        }
        match self.save_session() {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not save partial session: {}", e);
                None
            }
        }
    }
}
