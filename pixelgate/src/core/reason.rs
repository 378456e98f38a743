//! Structured failure reasons attached to failed stage outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Why a stage failed.
///
/// Every failure is converted into one of these variants at stage
/// granularity so the driver can render a uniform report regardless of
/// stage kind. The variants mirror the pipeline's error taxonomy: external
/// tool failures, missing artifacts, comparator verdicts, and toolchain
/// provisioning problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// An external command exited non-zero (or could not run at all).
    ExternalTool {
        /// The action that failed, rendered as `program arg1 arg2 ...`.
        action: String,
        /// Exit code, if the process ran to completion.
        exit_code: Option<i32>,
        /// Bounded tail of the combined stdout/stderr output.
        output_tail: String,
    },
    /// An expected output file was absent or unreadable after an action.
    ///
    /// This is an execution defect, not a comparison defect: the example
    /// ran but never produced its frame.
    ArtifactMissing {
        /// The path that should have existed.
        path: PathBuf,
    },
    /// Golden and candidate images have different dimensions.
    DimensionMismatch {
        /// Golden image dimensions (width, height).
        expected: (u32, u32),
        /// Candidate image dimensions (width, height).
        actual: (u32, u32),
    },
    /// The comparator's aggregate error exceeded the configured threshold.
    ThresholdExceeded {
        /// The example whose frame diverged.
        example: String,
        /// Aggregate error score.
        score: u64,
        /// The configured threshold the score was checked against.
        threshold: u64,
        /// Path of the materialized difference image, if one was written.
        diff_image: Option<PathBuf>,
    },
    /// The requested toolchain channel or target could not be provisioned.
    ToolchainUnavailable {
        /// The channel that could not be provisioned.
        channel: String,
    },
    /// An unexpected internal failure.
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl FailureReason {
    /// Convenience constructor for internal failures.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExternalTool {
                action, exit_code, ..
            } => match exit_code {
                Some(code) => write!(f, "action `{action}` exited with code {code}"),
                None => write!(f, "action `{action}` could not be executed"),
            },
            Self::ArtifactMissing { path } => {
                write!(f, "expected artifact {} was not produced", path.display())
            }
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: golden is {}x{}, candidate is {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            Self::ThresholdExceeded {
                example,
                score,
                threshold,
                ..
            } => write!(
                f,
                "example '{example}' differs from golden: score {score} exceeds threshold {threshold}"
            ),
            Self::ToolchainUnavailable { channel } => {
                write!(f, "toolchain '{channel}' is not available")
            }
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}
