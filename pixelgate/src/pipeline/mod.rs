//! Pipeline scheduling and reporting.
//!
//! The [`StageGraph`] orders stages by their prerequisite edges, runs
//! independent stages concurrently, and drains every stage to a terminal
//! state; the [`PipelineReport`] is the driver's immutable summary of one
//! run.

mod graph;
mod report;
mod spec;

pub use graph::{GraphExecutionResult, StageGraph};
pub use report::{PipelineReport, StageReport};
pub use spec::StageSpec;
