//! Visual regression stage.
//!
//! Builds the examples (optional action list), renders each one to a
//! candidate frame via the [`ExampleRunner`], and compares it pixel-wise
//! against its golden reference. The first failing example fails the
//! stage with the comparator's structured reason.

use super::{run_actions, Action, Stage, StageContext};
use crate::compare::{compare_files, CompareConfig};
use crate::core::{FailureReason, StageOutcome};
use crate::runner::{ExampleRunner, ExampleSpec};
use crate::toolchain::ToolchainDescriptor;
use async_trait::async_trait;
use std::fmt::Write as _;
use tracing::{info, warn};

/// A stage that renders example programs and checks them against goldens.
#[derive(Debug)]
pub struct RegressionStage {
    name: String,
    toolchain: ToolchainDescriptor,
    /// Build actions executed before any example runs (e.g. `cargo build
    /// --examples`). May be empty when the binaries already exist.
    build_actions: Vec<Action>,
    runner: ExampleRunner,
    compare: CompareConfig,
    examples: Vec<ExampleSpec>,
}

impl RegressionStage {
    /// Creates a regression stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        toolchain: ToolchainDescriptor,
        build_actions: Vec<Action>,
        runner: ExampleRunner,
        compare: CompareConfig,
        examples: Vec<ExampleSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            toolchain,
            build_actions,
            runner,
            compare,
            examples,
        }
    }

    async fn check_example(
        &self,
        spec: &ExampleSpec,
        log: &mut String,
    ) -> Result<(), FailureReason> {
        self.runner.run(spec).await?;

        let result = compare_files(&spec.golden, &spec.candidate, &spec.diff, &self.compare)
            .map_err(crate::compare::CompareError::into_failure_reason)?;

        let _ = writeln!(
            log,
            "example '{}': score {} (threshold {})",
            spec.name, result.score, result.threshold
        );

        if result.passed {
            info!(example = %spec.name, score = result.score, "example matches golden");
            Ok(())
        } else {
            warn!(
                example = %spec.name,
                score = result.score,
                threshold = result.threshold,
                "example diverged from golden"
            );
            Err(FailureReason::ThresholdExceeded {
                example: spec.name.clone(),
                score: result.score,
                threshold: result.threshold,
                diff_image: result.diff_image,
            })
        }
    }
}

#[async_trait]
impl Stage for RegressionStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        let mut log = String::new();

        if let Err(reason) = run_actions(&self.build_actions, &self.toolchain, ctx, &mut log).await
        {
            return StageOutcome::failed_with_log(reason, log);
        }

        for spec in &self.examples {
            if let Err(reason) = self.check_example(spec, &mut log).await {
                return StageOutcome::failed_with_log(reason, log);
            }
        }

        StageOutcome::passed_with_log(log)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compare::DiffMetric;
    use crate::core::StageStatus;
    use crate::runner::{RunnerConfig, DEFAULT_DUMP_ENV};
    use crate::toolchain::Channel;
    use image::{Rgba, RgbaImage};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_golden(dir: &Path, name: &str, image: &RgbaImage) {
        std::fs::create_dir_all(dir).unwrap();
        image.save(dir.join(format!("{name}.png"))).unwrap();
    }

    /// A fake example that copies a prepared frame to the dump path.
    fn fake_example(dir: &Path, name: &str, frame: &Path) {
        let path = dir.join(name);
        std::fs::write(
            &path,
            format!("#!/bin/sh\ncp \"{}\" \"${DEFAULT_DUMP_ENV}\"\n", frame.display()),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn stage_in(dir: &Path, threshold: u64, examples: &[&str]) -> RegressionStage {
        let config = RunnerConfig {
            dump_env: DEFAULT_DUMP_ENV.to_string(),
            golden_dir: dir.join("assets"),
            candidate_dir: dir.join("screenshots"),
            diff_dir: dir.join("diff"),
            bin_dir: dir.to_path_buf(),
        };
        let runner = ExampleRunner::new(config.clone());
        let examples = examples.iter().map(|name| config.example(*name)).collect();
        RegressionStage::new(
            "regression",
            ToolchainDescriptor::new(Channel::Stable),
            Vec::new(),
            runner,
            CompareConfig {
                metric: DiffMetric::CountDifferent,
                threshold,
                write_diff_image: true,
            },
            examples,
        )
    }

    #[tokio::test]
    async fn test_matching_frame_passes_at_zero_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let golden = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        write_golden(&dir.path().join("assets"), "ok", &golden);

        let frame = dir.path().join("frame.png");
        golden.save(&frame).unwrap();
        fake_example(dir.path(), "ok", &frame);

        let stage = stage_in(dir.path(), 0, &["ok"]);
        let outcome = stage.execute(&StageContext::for_testing(dir.path())).await;

        assert_eq!(outcome.status, StageStatus::Passed);
        assert!(outcome.log.contains("score 0"));
    }

    #[tokio::test]
    async fn test_diverging_frame_fails_with_score_and_diff() {
        let dir = tempfile::tempdir().unwrap();
        let golden = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        write_golden(&dir.path().join("assets"), "bad", &golden);

        let mut frame_image = golden.clone();
        frame_image.put_pixel(0, 0, Rgba([200, 2, 3, 255]));
        let frame = dir.path().join("frame.png");
        frame_image.save(&frame).unwrap();
        fake_example(dir.path(), "bad", &frame);

        let stage = stage_in(dir.path(), 0, &["bad"]);
        let outcome = stage.execute(&StageContext::for_testing(dir.path())).await;

        assert_eq!(outcome.status, StageStatus::Failed);
        match outcome.reason {
            Some(FailureReason::ThresholdExceeded {
                example,
                score,
                diff_image,
                ..
            }) => {
                assert_eq!(example, "bad");
                assert_eq!(score, 1);
                let diff = diff_image.expect("diff image should be written");
                assert!(diff.exists());
                assert!(diff.ends_with("bad.png"));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_frame_is_artifact_missing_not_comparator_error() {
        let dir = tempfile::tempdir().unwrap();
        let golden = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        write_golden(&dir.path().join("assets"), "silent", &golden);

        // Exits zero but never writes the frame.
        let path = dir.path().join("silent");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let stage = stage_in(dir.path(), 0, &["silent"]);
        let outcome = stage.execute(&StageContext::for_testing(dir.path())).await;

        assert_eq!(outcome.status, StageStatus::Failed);
        assert!(matches!(
            outcome.reason,
            Some(FailureReason::ArtifactMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_surfaces_as_such() {
        let dir = tempfile::tempdir().unwrap();
        write_golden(
            &dir.path().join("assets"),
            "resized",
            &RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])),
        );

        let frame = dir.path().join("frame.png");
        RgbaImage::from_pixel(4, 8, Rgba([0, 0, 0, 255]))
            .save(&frame)
            .unwrap();
        fake_example(dir.path(), "resized", &frame);

        let stage = stage_in(dir.path(), 0, &["resized"]);
        let outcome = stage.execute(&StageContext::for_testing(dir.path())).await;

        assert_eq!(
            outcome.reason,
            Some(FailureReason::DimensionMismatch {
                expected: (8, 8),
                actual: (4, 8),
            })
        );
    }

    #[tokio::test]
    async fn test_failed_build_action_stops_before_examples() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig::with_root(dir.path());
        let stage = RegressionStage::new(
            "regression",
            ToolchainDescriptor::new(Channel::Stable),
            vec![Action::new("false")],
            ExampleRunner::new(config.clone()),
            CompareConfig::default(),
            vec![config.example("never-run")],
        );

        let outcome = stage.execute(&StageContext::for_testing(dir.path())).await;
        assert!(matches!(
            outcome.reason,
            Some(FailureReason::ExternalTool { .. })
        ));
    }
}
