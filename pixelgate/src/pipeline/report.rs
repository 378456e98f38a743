//! Final pipeline report.
//!
//! Owned exclusively by the driver: built from the scheduler's outcomes
//! once no more stages are runnable, then immutable.

use super::GraphExecutionResult;
use crate::core::{FailureReason, StageOutcome, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

/// Per-stage entry in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// Terminal status.
    pub status: StageStatus,
    /// Structured failure reason, for failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// Skip trigger, for skipped stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Execution time in milliseconds.
    pub duration_ms: f64,
    /// Captured log tail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,
}

/// The final report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Per-stage reports, in declaration order.
    pub stages: Vec<StageReport>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// True iff every stage passed.
    pub success: bool,
}

impl PipelineReport {
    /// Assembles the report from the scheduler's result.
    ///
    /// `order` is the declaration order of the stages; every declared
    /// stage is expected to have a terminal outcome in `result`.
    #[must_use]
    pub fn from_execution(
        pipeline: impl Into<String>,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        order: &[String],
        mut result: GraphExecutionResult,
    ) -> Self {
        let stages = order
            .iter()
            .map(|name| {
                let outcome = result
                    .outcomes
                    .remove(name)
                    .unwrap_or_else(|| StageOutcome::failed(FailureReason::internal(
                        "stage has no recorded outcome",
                    )));
                StageReport {
                    name: name.clone(),
                    status: outcome.status,
                    reason: outcome.reason,
                    skip_reason: outcome.skip_reason,
                    duration_ms: outcome.duration_ms,
                    log: outcome.log,
                }
            })
            .collect();

        Self {
            run_id,
            pipeline: pipeline.into(),
            started_at,
            stages,
            duration_ms: result.duration_ms,
            success: result.success,
        }
    }

    /// Returns the first failed stage in declaration order, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&StageReport> {
        self.stages
            .iter()
            .find(|stage| stage.status == StageStatus::Failed)
    }

    /// The process exit code: 0 iff every stage passed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }

    /// Renders the human-readable report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pipeline '{}' (run {})", self.pipeline, self.run_id);

        let width = self
            .stages
            .iter()
            .map(|stage| stage.name.len())
            .max()
            .unwrap_or(0);

        for stage in &self.stages {
            let _ = write!(
                out,
                "  {:>7}  {:<width$}",
                stage.status.to_string(),
                stage.name,
            );
            match stage.status {
                StageStatus::Skipped => {
                    if let Some(reason) = &stage.skip_reason {
                        let _ = write!(out, "  ({reason})");
                    }
                }
                _ => {
                    let _ = write!(out, "  ({:.0} ms)", stage.duration_ms);
                }
            }
            let _ = writeln!(out);
        }

        if let Some(failure) = self.first_failure() {
            let _ = writeln!(out);
            let _ = writeln!(out, "first failure: {}", failure.name);
            if let Some(reason) = &failure.reason {
                let _ = writeln!(out, "  {reason}");
                if let FailureReason::ThresholdExceeded {
                    diff_image: Some(diff),
                    ..
                } = reason
                {
                    let _ = writeln!(out, "  difference image: {}", diff.display());
                }
            }
            if !failure.log.is_empty() {
                let _ = writeln!(out, "--- captured output ---");
                let _ = writeln!(out, "{}", failure.log.trim_end());
            }
        }

        let _ = writeln!(
            out,
            "\nresult: {} ({} stages, {:.0} ms)",
            if self.success { "passed" } else { "failed" },
            self.stages.len(),
            self.duration_ms
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn report_from(outcomes: Vec<(&str, StageOutcome)>) -> PipelineReport {
        let order: Vec<String> = outcomes.iter().map(|(name, _)| (*name).to_string()).collect();
        let outcomes: HashMap<String, StageOutcome> = outcomes
            .into_iter()
            .map(|(name, outcome)| (name.to_string(), outcome))
            .collect();
        let success = outcomes.values().all(StageOutcome::is_passed);
        PipelineReport::from_execution(
            "ci",
            Uuid::new_v4(),
            Utc::now(),
            &order,
            GraphExecutionResult {
                outcomes,
                duration_ms: 42.0,
                success,
            },
        )
    }

    #[test]
    fn test_all_passed_report() {
        let report = report_from(vec![
            ("fmt", StageOutcome::passed()),
            ("build", StageOutcome::passed()),
        ]);

        assert!(report.success);
        assert_eq!(report.exit_code(), 0);
        assert!(report.first_failure().is_none());
        assert!(report.render().contains("result: passed"));
    }

    #[test]
    fn test_first_failure_in_declaration_order() {
        let report = report_from(vec![
            ("fmt", StageOutcome::passed()),
            ("build", StageOutcome::failed(FailureReason::internal("x"))),
            ("test", StageOutcome::failed(FailureReason::internal("y"))),
        ]);

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.first_failure().map(|s| s.name.as_str()), Some("build"));
    }

    #[test]
    fn test_render_surfaces_failure_reason() {
        let report = report_from(vec![(
            "regression",
            StageOutcome::failed(FailureReason::ThresholdExceeded {
                example: "hello".to_string(),
                score: 12,
                threshold: 0,
                diff_image: Some("diff/hello.png".into()),
            }),
        )]);

        let rendered = report.render();
        assert!(rendered.contains("first failure: regression"));
        assert!(rendered.contains("score 12 exceeds threshold 0"));
        assert!(rendered.contains("difference image: diff/hello.png"));
    }

    #[test]
    fn test_skipped_stages_show_trigger() {
        let report = report_from(vec![
            ("fmt", StageOutcome::failed(FailureReason::internal("bad"))),
            (
                "build",
                StageOutcome::skipped("prerequisite 'fmt' did not pass"),
            ),
        ]);

        let rendered = report.render();
        assert!(rendered.contains("skipped"));
        assert!(rendered.contains("prerequisite 'fmt' did not pass"));
    }

    #[test]
    fn test_report_serializes() {
        let report = report_from(vec![("fmt", StageOutcome::passed())]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stages"][0]["name"], "fmt");
        assert_eq!(json["stages"][0]["status"], "passed");
    }
}
