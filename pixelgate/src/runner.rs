//! Example runner: renders one example program to a candidate frame file.
//!
//! The runner invokes a compiled example binary and directs its rendered
//! frame to a file instead of a visible display, by passing the destination
//! path through a single environment variable. Each example identity owns
//! its candidate and diff paths, so concurrent runs never race on a shared
//! temp name.

use crate::core::FailureReason;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default name of the environment variable carrying the dump destination.
pub const DEFAULT_DUMP_ENV: &str = "SIMULATOR_DUMP_PATH";

/// Artifact layout and invocation settings for the example runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Environment variable the example reads its output path from.
    #[serde(default = "default_dump_env")]
    pub dump_env: String,
    /// Directory holding golden reference images, keyed by example identity.
    pub golden_dir: PathBuf,
    /// Scratch directory candidate frames are written to.
    pub candidate_dir: PathBuf,
    /// Directory difference images are written to on failure.
    pub diff_dir: PathBuf,
    /// Directory holding the compiled example binaries.
    pub bin_dir: PathBuf,
}

fn default_dump_env() -> String {
    DEFAULT_DUMP_ENV.to_string()
}

impl RunnerConfig {
    /// Creates a config with the conventional layout under `root`:
    /// goldens in `assets/`, candidates in `target/screenshots/`, diffs in
    /// `target/screenshots/diff/`, binaries in `target/debug/examples/`.
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self {
            dump_env: default_dump_env(),
            golden_dir: root.join("assets"),
            candidate_dir: root.join("target").join("screenshots"),
            diff_dir: root.join("target").join("screenshots").join("diff"),
            bin_dir: root.join("target").join("debug").join("examples"),
        }
    }

    /// Resolves the artifact paths for one example identity.
    #[must_use]
    pub fn example(&self, name: impl Into<String>) -> ExampleSpec {
        let name = name.into();
        ExampleSpec {
            golden: self.golden_dir.join(format!("{name}.png")),
            candidate: self.candidate_dir.join(format!("{name}.png")),
            diff: self.diff_dir.join(format!("{name}.png")),
            binary: self.bin_dir.join(&name),
            name,
        }
    }
}

/// One example with its resolved artifact paths.
///
/// All paths derive from the example identity, one artifact slot per
/// example, so sibling comparisons never share a diagnostic path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSpec {
    /// Example identity, used as the filename stem everywhere.
    pub name: String,
    /// Golden reference image.
    pub golden: PathBuf,
    /// Candidate frame the example writes.
    pub candidate: PathBuf,
    /// Difference image written when the comparison fails.
    pub diff: PathBuf,
    /// The compiled example binary.
    pub binary: PathBuf,
}

/// Invokes compiled example binaries, one at a time.
#[derive(Debug, Clone)]
pub struct ExampleRunner {
    config: RunnerConfig,
}

impl ExampleRunner {
    /// Creates a runner with the given layout.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Returns the runner's configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs one example, directing its frame to the candidate path.
    ///
    /// # Errors
    ///
    /// Returns `ExternalTool` if the example itself exits non-zero (a
    /// runtime error of the example, distinct from a rendering mismatch),
    /// and `ArtifactMissing` if the example exits zero but the candidate
    /// frame is absent afterwards.
    pub async fn run(&self, spec: &ExampleSpec) -> Result<(), FailureReason> {
        if let Some(parent) = spec.candidate.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                return Err(FailureReason::internal(format!(
                    "cannot create {}: {err}",
                    parent.display()
                )));
            }
        }
        // A stale frame from an earlier run must not mask a missing one.
        let _ = tokio::fs::remove_file(&spec.candidate).await;

        debug!(example = %spec.name, candidate = %spec.candidate.display(), "running example");

        let output = match tokio::process::Command::new(&spec.binary)
            .env(&self.config.dump_env, &spec.candidate)
            .output()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                return Err(FailureReason::ExternalTool {
                    action: spec.binary.display().to_string(),
                    exit_code: None,
                    output_tail: err.to_string(),
                })
            }
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(FailureReason::ExternalTool {
                action: spec.binary.display().to_string(),
                exit_code: output.status.code(),
                output_tail: crate::stages::output_tail(&combined),
            });
        }

        match tokio::fs::metadata(&spec.candidate).await {
            Ok(_) => Ok(()),
            Err(_) => Err(FailureReason::ArtifactMissing {
                path: spec.candidate.clone(),
            }),
        }
    }
}
