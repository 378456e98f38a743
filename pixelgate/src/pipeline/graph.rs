//! Dependency graph scheduler.
//!
//! Executes stages as soon as their prerequisites have passed, running
//! independent stages concurrently. Unlike a fail-fast executor, the
//! scheduler always drains every stage to a terminal state: when a stage
//! fails, its transitive dependents are skipped without executing, and
//! unrelated branches keep running so the final report is complete.

use super::StageSpec;
use crate::core::{FailureReason, StageOutcome, StageStatus};
use crate::errors::{ConfigError, PixelgateError};
use crate::stages::StageContext;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::{info, warn};

/// Result of executing a stage graph.
#[derive(Debug)]
pub struct GraphExecutionResult {
    /// Per-stage terminal outcomes.
    pub outcomes: HashMap<String, StageOutcome>,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
    /// True iff every stage passed.
    pub success: bool,
}

/// A directed acyclic graph of verification stages.
#[derive(Debug)]
pub struct StageGraph {
    /// The pipeline name.
    name: String,
    /// Stage specifications by name.
    stages: HashMap<String, StageSpec>,
    /// Declaration order, kept for deterministic traversal and reporting.
    order: Vec<String>,
}

impl StageGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Adds a stage to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn add_stage(&mut self, spec: StageSpec) -> Result<(), ConfigError> {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.stages.contains_key(&spec.name) {
            return Err(ConfigError::DuplicateStage {
                name: spec.name.clone(),
            });
        }
        self.order.push(spec.name.clone());
        self.stages.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns stage names in declaration order.
    #[must_use]
    pub fn declaration_order(&self) -> &[String] {
        &self.order
    }

    /// Validates the prerequisite graph.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPrerequisite` for dangling edges and `CycleDetected`
    /// for cyclic ones. Both are fatal: nothing runs on an invalid graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.order {
            for prerequisite in &self.stages[name].prerequisites {
                if !self.stages.contains_key(prerequisite) {
                    return Err(ConfigError::UnknownPrerequisite {
                        stage: name.clone(),
                        prerequisite: prerequisite.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for name in &self.order {
            self.visit(name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        if let Some(position) = stack.iter().position(|entry| entry == node) {
            let mut path: Vec<String> = stack[position..].to_vec();
            path.push(node.to_string());
            return Err(ConfigError::CycleDetected { path });
        }
        if visited.contains(node) {
            return Ok(());
        }

        stack.push(node.to_string());
        for prerequisite in &self.stages[node].prerequisites {
            self.visit(prerequisite, visited, stack)?;
        }
        stack.pop();
        visited.insert(node.to_string());
        Ok(())
    }

    /// Executes the graph to completion.
    ///
    /// Stages whose prerequisites are all `Passed` start concurrently; the
    /// only guaranteed order is prerequisite-before-dependent. On failure,
    /// every transitive dependent transitions directly to `Skipped`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the graph is invalid; execution
    /// itself never errors, stage failures are recorded in the result.
    pub async fn execute(&self, ctx: &StageContext) -> Result<GraphExecutionResult, PixelgateError> {
        self.validate()?;

        let start = Instant::now();
        let total = self.stages.len();
        let mut outcomes: HashMap<String, StageOutcome> = HashMap::new();

        // Reverse edges, used for unlock and skip propagation.
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for name in &self.order {
            let spec = &self.stages[name];
            in_degree.insert(name.clone(), spec.prerequisites.len());
            for prerequisite in &spec.prerequisites {
                dependents
                    .entry(prerequisite.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        let mut active: FuturesUnordered<BoxFuture<'static, (String, StageOutcome)>> =
            FuturesUnordered::new();
        for name in &self.order {
            if in_degree[name] == 0 {
                active.push(self.spawn_stage(name.clone(), ctx.clone()));
            }
        }

        while outcomes.len() < total {
            let Some((name, outcome)) = active.next().await else {
                let pending: Vec<_> = self
                    .order
                    .iter()
                    .filter(|name| !outcomes.contains_key(*name))
                    .cloned()
                    .collect();
                return Err(PixelgateError::Internal(format!(
                    "stage graph stalled; remaining stages: {pending:?}"
                )));
            };

            match outcome.status {
                StageStatus::Passed => {
                    info!(stage = %name, duration_ms = outcome.duration_ms, "stage passed");
                    ctx.sink.try_emit(
                        "stage.passed",
                        Some(serde_json::json!({
                            "stage": &name,
                            "duration_ms": outcome.duration_ms,
                        })),
                    );
                }
                _ => {
                    warn!(stage = %name, reason = ?outcome.reason, "stage failed");
                    ctx.sink.try_emit(
                        "stage.failed",
                        Some(serde_json::json!({
                            "stage": &name,
                            "reason": outcome.reason,
                        })),
                    );
                }
            }

            let passed = outcome.is_passed();
            outcomes.insert(name.clone(), outcome);

            if passed {
                for child in dependents.get(&name).into_iter().flatten() {
                    if let Some(count) = in_degree.get_mut(child) {
                        *count = count.saturating_sub(1);
                        if *count == 0 && !outcomes.contains_key(child) {
                            active.push(self.spawn_stage(child.clone(), ctx.clone()));
                        }
                    }
                }
            } else {
                self.skip_dependents(&name, ctx, &dependents, &mut outcomes);
            }
        }

        let success = outcomes.values().all(StageOutcome::is_passed);
        Ok(GraphExecutionResult {
            outcomes,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            success,
        })
    }

    /// Marks every transitive dependent of `failed` as skipped.
    ///
    /// A dependent may still have other prerequisites running; it is
    /// skipped proactively and never started (the in-degree bookkeeping
    /// guards against a later spawn).
    fn skip_dependents(
        &self,
        failed: &str,
        ctx: &StageContext,
        dependents: &HashMap<String, Vec<String>>,
        outcomes: &mut HashMap<String, StageOutcome>,
    ) {
        let reason = format!("prerequisite '{failed}' did not pass");
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(failed);

        while let Some(node) = queue.pop_front() {
            for child in dependents.get(node).into_iter().flatten() {
                if outcomes.contains_key(child) {
                    continue;
                }
                info!(stage = %child, trigger = %failed, "stage skipped");
                ctx.sink.try_emit(
                    "stage.skipped",
                    Some(serde_json::json!({
                        "stage": child,
                        "reason": &reason,
                    })),
                );
                outcomes.insert(child.clone(), StageOutcome::skipped(reason.clone()));
                queue.push_back(child);
            }
        }
    }

    /// Builds the future executing one stage on its own task.
    fn spawn_stage(
        &self,
        name: String,
        ctx: StageContext,
    ) -> BoxFuture<'static, (String, StageOutcome)> {
        let runner = self.stages[&name].runner.clone();

        async move {
            ctx.sink.try_emit(
                "stage.started",
                Some(serde_json::json!({ "stage": &name })),
            );
            let started = Instant::now();

            let task_ctx = ctx.clone();
            let handle = tokio::spawn(async move { runner.execute(&task_ctx).await });
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => StageOutcome::failed(FailureReason::internal(format!(
                    "stage panicked: {err}"
                ))),
            };

            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            (name, outcome.with_duration_ms(duration_ms))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StaticStage;
    use std::sync::Arc;

    fn passing(name: &str) -> StageSpec {
        StageSpec::new(name, Arc::new(StaticStage::passing(name)))
    }

    fn failing(name: &str) -> StageSpec {
        StageSpec::new(name, Arc::new(StaticStage::failing(name)))
    }

    fn graph_of(specs: Vec<StageSpec>) -> StageGraph {
        let mut graph = StageGraph::new("test");
        for spec in specs {
            graph.add_stage(spec).unwrap();
        }
        graph
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut graph = StageGraph::new("test");
        graph.add_stage(passing("fmt")).unwrap();
        let err = graph.add_stage(passing("fmt")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateStage {
                name: "fmt".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_prerequisite_is_fatal() {
        let graph = graph_of(vec![passing("build").with_prerequisite("fmt")]);
        let err = graph.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownPrerequisite {
                stage: "build".to_string(),
                prerequisite: "fmt".to_string(),
            }
        );
    }

    #[test]
    fn test_cycle_is_fatal_with_path() {
        let graph = graph_of(vec![
            passing("a").with_prerequisite("c"),
            passing("b").with_prerequisite("a"),
            passing("c").with_prerequisite("b"),
        ]);
        match graph.validate().unwrap_err() {
            ConfigError::CycleDetected { path } => {
                assert!(path.len() >= 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph_of(vec![passing("a").with_prerequisite("a")]);
        assert!(matches!(
            graph.validate(),
            Err(ConfigError::CycleDetected { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_passing_graph_succeeds() {
        let graph = graph_of(vec![
            passing("fmt"),
            passing("build").with_prerequisite("fmt"),
            passing("test").with_prerequisite("build"),
        ]);
        let ctx = StageContext::for_testing(".");

        let result = graph.execute(&ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.outcomes.len(), 3);
        assert!(result.outcomes.values().all(StageOutcome::is_passed));
    }

    #[tokio::test]
    async fn test_failure_skips_transitive_dependents() {
        let graph = graph_of(vec![
            failing("fmt"),
            passing("build").with_prerequisite("fmt"),
            passing("test").with_prerequisite("build"),
        ]);
        let ctx = StageContext::for_testing(".");

        let result = graph.execute(&ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.outcomes["fmt"].status, StageStatus::Failed);
        assert_eq!(result.outcomes["build"].status, StageStatus::Skipped);
        assert_eq!(result.outcomes["test"].status, StageStatus::Skipped);
        assert_eq!(
            result.outcomes["test"].skip_reason.as_deref(),
            Some("prerequisite 'fmt' did not pass")
        );
    }

    #[tokio::test]
    async fn test_independent_failures_do_not_interact() {
        let graph = graph_of(vec![failing("left"), failing("right"), passing("lone")]);
        let ctx = StageContext::for_testing(".");

        let result = graph.execute(&ctx).await.unwrap();
        assert_eq!(result.outcomes["left"].status, StageStatus::Failed);
        assert_eq!(result.outcomes["right"].status, StageStatus::Failed);
        assert_eq!(result.outcomes["lone"].status, StageStatus::Passed);
    }

    #[tokio::test]
    async fn test_diamond_with_one_failed_side() {
        // top -> {left(fails), right} -> bottom
        let graph = graph_of(vec![
            passing("top"),
            failing("left").with_prerequisite("top"),
            passing("right").with_prerequisite("top"),
            passing("bottom")
                .with_prerequisite("left")
                .with_prerequisite("right"),
        ]);
        let ctx = StageContext::for_testing(".");

        let result = graph.execute(&ctx).await.unwrap();
        assert_eq!(result.outcomes["right"].status, StageStatus::Passed);
        assert_eq!(result.outcomes["bottom"].status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_every_stage_reaches_a_terminal_state() {
        let graph = graph_of(vec![
            failing("a"),
            passing("b").with_prerequisite("a"),
            passing("c").with_prerequisite("b"),
            passing("d"),
            failing("e").with_prerequisite("d"),
            passing("f").with_prerequisite("e"),
        ]);
        let ctx = StageContext::for_testing(".");

        let result = graph.execute(&ctx).await.unwrap();
        assert_eq!(result.outcomes.len(), 6);
        assert!(result
            .outcomes
            .values()
            .all(|outcome| outcome.status.is_terminal()));
    }
}
