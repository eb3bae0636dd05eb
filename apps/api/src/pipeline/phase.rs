use std::fmt;

use serde::{Deserialize, Serialize};

/// A named stage of the pipeline state machine.
///
/// Forward order: `idle → parsing → searching → analyzing → generating → completed`.
/// `cancelled` and `error` are reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Parsing,
    Searching,
    Analyzing,
    Generating,
    Completed,
    Cancelled,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Parsing => "parsing",
            Phase::Searching => "searching",
            Phase::Analyzing => "analyzing",
            Phase::Generating => "generating",
            Phase::Completed => "completed",
            Phase::Cancelled => "cancelled",
            Phase::Error => "error",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Parsing => 1,
            Phase::Searching => 2,
            Phase::Analyzing => 3,
            Phase::Generating => 4,
            Phase::Completed => 5,
            Phase::Cancelled | Phase::Error => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Error)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    /// Skipping forward (e.g. `searching → completed` on zero jobs) is allowed.
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Phase::Cancelled | Phase::Error => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
