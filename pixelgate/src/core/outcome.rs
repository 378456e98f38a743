//! Stage outcome type with factory methods.

use super::{FailureReason, StageStatus};
use serde::{Deserialize, Serialize};

/// The result of one stage execution.
///
/// `StageOutcome` is immutable once created and provides factory methods
/// for the three terminal states a stage can reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The terminal status of the stage.
    pub status: StageStatus,

    /// Structured failure reason (for failed stages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,

    /// Why the stage was skipped (for skipped stages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Captured log output, bounded to a tail by the executor.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,

    /// Wall-clock execution time in milliseconds. Zero for skipped stages.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageOutcome {
    /// Creates a passed outcome with no captured log.
    #[must_use]
    pub fn passed() -> Self {
        Self {
            status: StageStatus::Passed,
            reason: None,
            skip_reason: None,
            log: String::new(),
            duration_ms: 0.0,
        }
    }

    /// Creates a passed outcome with captured log output.
    #[must_use]
    pub fn passed_with_log(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            ..Self::passed()
        }
    }

    /// Creates a failed outcome with a structured reason.
    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            status: StageStatus::Failed,
            reason: Some(reason),
            skip_reason: None,
            log: String::new(),
            duration_ms: 0.0,
        }
    }

    /// Creates a failed outcome with a reason and captured log output.
    #[must_use]
    pub fn failed_with_log(reason: FailureReason, log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            ..Self::failed(reason)
        }
    }

    /// Creates a skipped outcome with the prerequisite that triggered it.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            reason: None,
            skip_reason: Some(reason.into()),
            log: String::new(),
            duration_ms: 0.0,
        }
    }

    /// Returns a copy with the measured duration attached.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the stage passed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.status == StageStatus::Passed
    }
}

impl Default for StageOutcome {
    fn default() -> Self {
        Self::passed()
    }
}
