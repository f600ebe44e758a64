use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Completion-request loop states. One cycle runs
/// `Idle -> AwaitingCompletion -> Accumulating -> Dispatching` and either
/// loops back into `AwaitingCompletion` or lands in `Idle` (reply) or
/// `Terminated` (stop signal).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingCompletion,
    Accumulating,
    Dispatching,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingCompletion => "awaiting_completion",
            Self::Accumulating => "accumulating",
            Self::Dispatching => "dispatching",
            Self::Terminated => "terminated",
        }
    }

    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (Self::Terminated, _) => false,
            // Any active state may abort back to Idle.
            (_, Self::Idle) => true,
            (Self::Idle, Self::AwaitingCompletion) => true,
            (Self::AwaitingCompletion, Self::Accumulating) => true,
            (Self::Accumulating, Self::Dispatching) => true,
            // Continuation and retry re-enter the request state.
            (Self::Accumulating, Self::AwaitingCompletion) => true,
            (Self::Dispatching, Self::AwaitingCompletion) => true,
            (Self::Dispatching, Self::Terminated) => true,
            _ => false,
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a submitted turn ended. `Finished` is the terminal stop signal
/// raised by `stop_edits`; the harness pattern-matches instead of catching
/// a control-flow exception.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(String),
    Finished,
}
