//! Command stage: runs an ordered list of external actions.
//!
//! This is the executor behind every build, test, format and doc-check
//! stage. Actions run strictly sequentially; the first non-zero exit code
//! terminates the stage with a failure that records which action failed,
//! its exit code, and a bounded tail of the combined output. No action is
//! retried: a flaky external tool surfaces as a failed stage, never a
//! silent pass.

use super::{Stage, StageContext};
use crate::core::{FailureReason, StageOutcome};
use crate::toolchain::ToolchainDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Maximum number of output lines retained per failed action.
const TAIL_LINES: usize = 40;

/// Maximum retained output size in bytes.
const TAIL_BYTES: usize = 4096;

/// One external command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// The program to invoke.
    pub program: String,
    /// Arguments, in order.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Action {
    /// Creates an action with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Creates an action with arguments.
    #[must_use]
    pub fn with_args(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Keeps the last [`TAIL_LINES`] lines of `output`, capped at
/// [`TAIL_BYTES`] bytes.
#[must_use]
pub(crate) fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    let mut tail = lines[start..].join("\n");

    if tail.len() > TAIL_BYTES {
        let cut = tail.len() - TAIL_BYTES;
        let boundary = (cut..tail.len())
            .find(|i| tail.is_char_boundary(*i))
            .unwrap_or(tail.len());
        tail = tail.split_off(boundary);
    }
    tail
}

/// Classifies a failed cargo invocation.
///
/// rustup reports an unprovisioned channel by failing the proxied command
/// with a "toolchain ... is not installed" message; that is the only way
/// the executor can tell a missing toolchain from an ordinary tool error.
fn classify_failure(
    action: &Action,
    toolchain: &ToolchainDescriptor,
    exit_code: Option<i32>,
    tail: String,
) -> FailureReason {
    if tail.contains("toolchain") && tail.contains("is not installed") {
        return FailureReason::ToolchainUnavailable {
            channel: toolchain.channel.to_string(),
        };
    }
    FailureReason::ExternalTool {
        action: action.to_string(),
        exit_code,
        output_tail: tail,
    }
}

/// Runs `actions` sequentially in the stage's working directory.
///
/// Appends each action's combined stdout/stderr to `log`. Returns at the
/// first failing action. Cargo invocations get the toolchain-override
/// argument (`+channel`) injected as their first argument.
pub async fn run_actions(
    actions: &[Action],
    toolchain: &ToolchainDescriptor,
    ctx: &StageContext,
    log: &mut String,
) -> Result<(), FailureReason> {
    for action in actions {
        debug!(action = %action, "running action");
        log.push_str(&format!("$ {action}\n"));

        let mut command = tokio::process::Command::new(&action.program);
        if action.program == "cargo" {
            command.arg(toolchain.override_arg());
        }
        command.args(&action.args);
        command.current_dir(ctx.working_dir());

        let output = match command.output().await {
            Ok(output) => output,
            Err(err) => {
                let tail = err.to_string();
                log.push_str(&tail);
                log.push('\n');
                return Err(FailureReason::ExternalTool {
                    action: action.to_string(),
                    exit_code: None,
                    output_tail: tail,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        log.push_str(&combined);
        if !combined.ends_with('\n') {
            log.push('\n');
        }

        if !output.status.success() {
            let tail = output_tail(&combined);
            return Err(classify_failure(
                action,
                toolchain,
                output.status.code(),
                tail,
            ));
        }
    }
    Ok(())
}

/// A stage that runs an ordered list of external actions.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    toolchain: ToolchainDescriptor,
    actions: Vec<Action>,
}

impl CommandStage {
    /// Creates a command stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        toolchain: ToolchainDescriptor,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            name: name.into(),
            toolchain,
            actions,
        }
    }

    /// Returns the toolchain descriptor this stage runs under.
    #[must_use]
    pub fn toolchain(&self) -> &ToolchainDescriptor {
        &self.toolchain
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        let mut log = String::new();
        match run_actions(&self.actions, &self.toolchain, ctx, &mut log).await {
            Ok(()) => StageOutcome::passed_with_log(log),
            Err(reason) => StageOutcome::failed_with_log(reason, log),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageStatus;
    use crate::toolchain::Channel;

    fn stable() -> ToolchainDescriptor {
        ToolchainDescriptor::new(Channel::Stable)
    }

    #[test]
    fn test_action_display() {
        let action = Action::with_args("cargo", ["build", "--release"]);
        assert_eq!(action.to_string(), "cargo build --release");
    }

    #[test]
    fn test_output_tail_keeps_last_lines() {
        let output: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let tail = output_tail(&output);
        assert!(tail.starts_with("line 60"));
        assert!(tail.ends_with("line 99"));
    }

    #[test]
    fn test_classify_missing_toolchain() {
        let action = Action::with_args("cargo", ["build"]);
        let reason = classify_failure(
            &action,
            &ToolchainDescriptor::new(Channel::Nightly),
            Some(1),
            "error: toolchain 'nightly-x86_64-unknown-linux-gnu' is not installed".to_string(),
        );
        assert_eq!(
            reason,
            FailureReason::ToolchainUnavailable {
                channel: "nightly".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_successful_actions_pass() {
        let stage = CommandStage::new(
            "ok",
            stable(),
            vec![Action::new("true"), Action::new("true")],
        );
        let ctx = StageContext::for_testing(".");

        let outcome = stage.execute(&ctx).await;
        assert_eq!(outcome.status, StageStatus::Passed);
    }

    #[tokio::test]
    async fn test_failing_action_records_exit_code() {
        let stage = CommandStage::new("bad", stable(), vec![Action::new("false")]);
        let ctx = StageContext::for_testing(".");

        let outcome = stage.execute(&ctx).await;
        assert_eq!(outcome.status, StageStatus::Failed);
        match outcome.reason {
            Some(FailureReason::ExternalTool {
                action, exit_code, ..
            }) => {
                assert_eq!(action, "false");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let stage = CommandStage::new(
            "short-circuit",
            stable(),
            vec![
                Action::new("false"),
                Action::with_args("touch", [marker.to_string_lossy()]),
            ],
        );
        let ctx = StageContext::for_testing(dir.path());

        let outcome = stage.execute(&ctx).await;
        assert_eq!(outcome.status, StageStatus::Failed);
        assert!(!marker.exists(), "action after the failure must not run");
    }

    #[tokio::test]
    async fn test_missing_program_fails_without_exit_code() {
        let stage = CommandStage::new(
            "absent",
            stable(),
            vec![Action::new("pixelgate-no-such-program")],
        );
        let ctx = StageContext::for_testing(".");

        let outcome = stage.execute(&ctx).await;
        match outcome.reason {
            Some(FailureReason::ExternalTool { exit_code, .. }) => {
                assert_eq!(exit_code, None);
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_output_is_captured_in_log() {
        let stage = CommandStage::new(
            "echo",
            stable(),
            vec![Action::with_args("echo", ["hello"])],
        );
        let ctx = StageContext::for_testing(".");

        let outcome = stage.execute(&ctx).await;
        assert!(outcome.log.contains("$ echo hello"));
        assert!(outcome.log.contains("hello"));
    }
}
