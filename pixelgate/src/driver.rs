//! Pipeline driver: the top-level entry point.
//!
//! Loads the stage declarations, expands toolchain matrices, wires the
//! prerequisite edges into a [`StageGraph`], executes it, and assembles
//! the final [`PipelineReport`]. The driver is the only component with an
//! external-facing contract: the process exits 0 iff every stage passed.

use crate::compare::CompareConfig;
use crate::config::PipelineManifest;
use crate::errors::PixelgateError;
use crate::events::{EventSink, LoggingEventSink};
use crate::pipeline::{PipelineReport, StageGraph, StageSpec};
use crate::runner::{ExampleRunner, RunnerConfig};
use crate::stages::{CommandStage, RegressionStage, Stage, StageContext};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Driver settings not carried by the manifest.
#[derive(Clone)]
pub struct DriverOptions {
    /// Directory stages run in; also the root of the default artifact
    /// layout.
    pub working_dir: PathBuf,
    /// Overrides every regression stage's comparison threshold.
    pub threshold_override: Option<u64>,
    /// Event sink for stage lifecycle events.
    pub sink: Arc<dyn EventSink>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            threshold_override: None,
            sink: Arc::new(LoggingEventSink::info()),
        }
    }
}

impl std::fmt::Debug for DriverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverOptions")
            .field("working_dir", &self.working_dir)
            .field("threshold_override", &self.threshold_override)
            .finish_non_exhaustive()
    }
}

/// Runs one pipeline from manifest to report.
#[derive(Debug)]
pub struct Driver {
    manifest: PipelineManifest,
    options: DriverOptions,
}

impl Driver {
    /// Creates a driver for the given manifest.
    #[must_use]
    pub fn new(manifest: PipelineManifest, options: DriverOptions) -> Self {
        Self { manifest, options }
    }

    /// Builds the concrete stage graph from the manifest.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate stage names; edge
    /// errors surface from graph validation.
    pub fn build_graph(&self) -> Result<StageGraph, PixelgateError> {
        let runner_config = self
            .manifest
            .artifacts
            .clone()
            .unwrap_or_else(|| RunnerConfig::with_root(&self.options.working_dir));

        let mut graph = StageGraph::new(&self.manifest.name);
        for decl in self.manifest.expanded_stages() {
            let runner: Arc<dyn Stage> = match &decl.regression {
                Some(regression) => {
                    let compare = CompareConfig {
                        threshold: self
                            .options
                            .threshold_override
                            .unwrap_or(regression.compare.threshold),
                        ..regression.compare.clone()
                    };
                    let examples = regression
                        .examples
                        .iter()
                        .map(|name| runner_config.example(name))
                        .collect();
                    Arc::new(RegressionStage::new(
                        decl.name.clone(),
                        decl.toolchain.clone(),
                        decl.actions.clone(),
                        ExampleRunner::new(runner_config.clone()),
                        compare,
                        examples,
                    ))
                }
                None => Arc::new(CommandStage::new(
                    decl.name.clone(),
                    decl.toolchain.clone(),
                    decl.actions.clone(),
                )),
            };

            let spec = StageSpec::new(&decl.name, runner).with_prerequisites(decl.needs.clone());
            graph.add_stage(spec)?;
        }
        Ok(graph)
    }

    /// Runs the pipeline to completion and assembles the report.
    ///
    /// Stage failures never surface as errors; they are part of the
    /// report. Only configuration defects abort before execution.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the graph is invalid.
    pub async fn run(&self) -> Result<PipelineReport, PixelgateError> {
        let graph = self.build_graph()?;
        graph.validate()?;

        let ctx = StageContext::new(&self.options.working_dir, self.options.sink.clone());
        info!(
            pipeline = %self.manifest.name,
            run_id = %ctx.run_id,
            stages = graph.stage_count(),
            "starting pipeline"
        );

        let started_at = Utc::now();
        let order = graph.declaration_order().to_vec();
        let result = graph.execute(&ctx).await?;

        Ok(PipelineReport::from_execution(
            self.manifest.name.clone(),
            ctx.run_id,
            started_at,
            &order,
            result,
        ))
    }
}
