//! Stage status enum and transition helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a stage.
///
/// Valid transitions are `Pending -> Running -> {Passed, Failed}`, or
/// `Pending -> Skipped` when a prerequisite did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started yet.
    Pending,
    /// Stage is currently executing.
    Running,
    /// Stage completed and all actions succeeded.
    Passed,
    /// Stage completed with a failure.
    Failed,
    /// Stage never executed because a prerequisite did not pass.
    Skipped,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }

    /// Returns true if the status unlocks dependent stages.
    ///
    /// Only `Passed` does; a skipped prerequisite propagates the skip.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns true if the stage reached a terminal state without passing.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped)
    }
}
