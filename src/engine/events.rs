//! Best-effort study analytics
//!
//! Events are fire-and-forget: a sink never reports failure back to the
//! session, so a broken sink can't interrupt a study flow.

use serde::Serialize;
use tracing::debug;

use super::models::{SelfEvaluation, SessionSummary, StudyMode};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudyEvent {
    SessionStarted { mode: StudyMode, queued: usize },
    SelfEvaluated { word: String, choice: SelfEvaluation },
    SpellingSubmitted { word: String, correct: bool },
    LevelChanged { word: String, from: u8, to: u8 },
    SessionCompleted { summary: SessionSummary },
}

pub trait EventSink {
    fn track(&self, event: &StudyEvent);
}

/// Logs events through `tracing` under the `wordloop::analytics` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn track(&self, event: &StudyEvent) {
        match serde_json::to_string(event) {
            Ok(json) => debug!(target: "wordloop::analytics", "{}", json),
            Err(e) => debug!(target: "wordloop::analytics", "Unserializable event: {}", e),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn track(&self, _event: &StudyEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = StudyEvent::LevelChanged { word: "apple".into(), from: 1, to: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "level_changed");
        assert_eq!(json["to"], 2);
    }
}
