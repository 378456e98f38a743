//! Error types for the pixelgate pipeline.
//!
//! Stage-level failures never surface here: they are converted into
//! [`StageOutcome`](crate::core::StageOutcome)s at stage granularity so one
//! broken stage cannot prevent the scheduler from completing unrelated
//! stages and producing a full report. The errors in this module are the
//! fatal ones — configuration defects detected before any stage runs, and
//! genuine internal faults.

use thiserror::Error;

/// The main error type for pixelgate operations.
#[derive(Debug, Error)]
pub enum PixelgateError {
    /// The pipeline configuration is invalid; nothing was executed.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error while loading a manifest.
    #[error("manifest parse error: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A fatal pipeline configuration error.
///
/// Raised by manifest loading or graph validation, always before any stage
/// has started executing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The prerequisite graph contains a cycle.
    #[error("prerequisite cycle detected: {}", path.join(" -> "))]
    CycleDetected {
        /// The stages forming the cycle, in traversal order.
        path: Vec<String>,
    },

    /// A stage names a prerequisite that is not declared anywhere.
    #[error("stage '{stage}' requires unknown stage '{prerequisite}'")]
    UnknownPrerequisite {
        /// The stage with the dangling edge.
        stage: String,
        /// The prerequisite name that does not exist.
        prerequisite: String,
    },

    /// Two stages share the same name.
    #[error("duplicate stage name '{name}'")]
    DuplicateStage {
        /// The name that was declared twice.
        name: String,
    },

    /// A stage or pipeline name is empty or whitespace-only.
    #[error("stage and pipeline names cannot be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_message() {
        let err = ConfigError::CycleDetected {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "prerequisite cycle detected: a -> b -> a");
    }

    #[test]
    fn test_unknown_prerequisite_message() {
        let err = ConfigError::UnknownPrerequisite {
            stage: "test".to_string(),
            prerequisite: "fmt".to_string(),
        };
        assert_eq!(err.to_string(), "stage 'test' requires unknown stage 'fmt'");
    }

    #[test]
    fn test_config_error_converts() {
        let err: PixelgateError = ConfigError::EmptyName.into();
        assert!(matches!(err, PixelgateError::Config(_)));
    }
}
