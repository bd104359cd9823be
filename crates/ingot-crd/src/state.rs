//! Workflow and action states
//!
//! One state enum serves both workflows and actions; the wire strings
//! (`STATE_PENDING` etc.) are stored verbatim in persisted status fields.

use serde::{Deserialize, Serialize};

/// State of a workflow or of a single action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Waiting to be executed
    #[default]
    StatePending,
    /// Currently executing
    StateRunning,
    /// Completed successfully
    StateSuccess,
    /// Failed
    StateFailed,
    /// Timed out
    StateTimeout,
}

impl State {
    /// Whether this state is terminal (no further transitions accepted)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            State::StateSuccess | State::StateFailed | State::StateTimeout
        )
    }

    /// The fixed wire string for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            State::StatePending => "STATE_PENDING",
            State::StateRunning => "STATE_RUNNING",
            State::StateSuccess => "STATE_SUCCESS",
            State::StateFailed => "STATE_FAILED",
            State::StateTimeout => "STATE_TIMEOUT",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
