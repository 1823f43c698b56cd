//! Episode state: exploration bookkeeping, turn records, and terminal states.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::protocol::Action;

/// How an episode ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The participant submitted a final document via `respond`.
    Responded,
    /// The step counter reached the configured maximum before `respond`.
    StepLimitExceeded,
    /// The participant emitted output that is not a recognized action.
    MalformedOutput,
}

/// Per-episode exploration record: explored path -> result summary, plus the
/// step counter. Owned by exactly one episode and dropped at episode end.
#[derive(Debug, Default)]
pub struct ExplorationState {
    explored: BTreeMap<String, String>,
    steps: u32,
}

impl ExplorationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed tool step.
    pub fn record(&mut self, path: &str, summary: String) {
        self.explored.insert(path.to_string(), summary);
        self.steps += 1;
    }

    /// Record a step that produced no exploration result (e.g. a tool error).
    pub fn record_step(&mut self) {
        self.steps += 1;
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps
    }

    pub fn explored_paths(&self) -> impl Iterator<Item = &str> {
        self.explored.keys().map(String::as_str)
    }

    pub fn explored_count(&self) -> usize {
        self.explored.len()
    }
}

/// One turn of the episode, persisted to the transcript artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub step: u32,
    /// The parsed action, absent when parsing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Tool reply body for tool turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
    /// Parse or producer failure for this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploration_state_tracks_paths_and_steps() {
        let mut state = ExplorationState::new();
        state.record(".", "3 entries".to_string());
        state.record("main.py", "412 bytes".to_string());
        state.record_step();

        assert_eq!(state.steps_taken(), 3);
        assert_eq!(state.explored_count(), 2);
        let paths: Vec<&str> = state.explored_paths().collect();
        assert_eq!(paths, vec![".", "main.py"]);
    }

    #[test]
    fn re_exploring_a_path_still_counts_the_step() {
        let mut state = ExplorationState::new();
        state.record(".", "3 entries".to_string());
        state.record(".", "3 entries".to_string());

        assert_eq!(state.steps_taken(), 2);
        assert_eq!(state.explored_count(), 1);
    }

    #[test]
    fn turn_record_omits_empty_fields() {
        let record = TurnRecord {
            step: 1,
            action: None,
            reply: None,
            error: Some("parse action json".to_string()),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(!json.contains("action"));
        assert!(!json.contains("reply"));
        assert!(json.contains("error"));
    }
}
