//! Stage trait and implementations.
//!
//! Stages are the units of verification work in a pixelgate pipeline:
//! format checks, builds, test runs, and visual regression checks all
//! implement the same [`Stage`] trait so the scheduler and report never
//! depend on a stage's kind.

mod command;
mod regression;

pub use command::{run_actions, Action, CommandStage};
pub(crate) use command::output_tail;
pub use regression::RegressionStage;

use crate::core::StageOutcome;
use crate::events::{EventSink, NoOpEventSink};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Execution context shared by all stages of one pipeline run.
///
/// The context is immutable for the duration of the run; the only mutable
/// state a stage touches is its own working files.
#[derive(Clone)]
pub struct StageContext {
    /// Unique identifier of this pipeline run.
    pub run_id: Uuid,
    /// Directory external commands are spawned in.
    pub working_dir: PathBuf,
    /// Sink for lifecycle events.
    pub sink: Arc<dyn EventSink>,
}

impl StageContext {
    /// Creates a context rooted at the given working directory.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            working_dir: working_dir.into(),
            sink,
        }
    }

    /// Creates a context with a no-op sink, for tests.
    #[must_use]
    pub fn for_testing(working_dir: impl Into<PathBuf>) -> Self {
        Self::new(working_dir, Arc::new(NoOpEventSink))
    }

    /// Returns the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("run_id", &self.run_id)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

/// Trait for pipeline stages.
///
/// A stage runs to completion and reports a terminal [`StageOutcome`];
/// it must never panic, and any internal error must be converted into a
/// failed outcome so the scheduler can finish the rest of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage to completion.
    async fn execute(&self, ctx: &StageContext) -> StageOutcome;
}

/// A function-based stage, mainly useful in tests.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageOutcome + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageOutcome + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        (self.func)(ctx)
    }
}

/// A fixture stage that returns a pre-built outcome.
#[derive(Debug, Clone)]
pub struct StaticStage {
    name: String,
    outcome: StageOutcome,
}

impl StaticStage {
    /// Creates a stage that always passes.
    #[must_use]
    pub fn passing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::passed(),
        }
    }

    /// Creates a stage that always fails with an internal reason.
    #[must_use]
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: StageOutcome::failed(crate::core::FailureReason::internal(
                "fixture failure",
            )),
        }
    }

    /// Creates a stage that returns the given outcome.
    #[must_use]
    pub fn with_outcome(name: impl Into<String>, outcome: StageOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
        }
    }
}

#[async_trait]
impl Stage for StaticStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> StageOutcome {
        self.outcome.clone()
    }
}
