//! # Pixelgate
//!
//! A dependency-gated verification pipeline for graphics libraries, with
//! visual regression checks against golden reference images.
//!
//! Pixelgate orders heterogeneous verification stages (format check,
//! embedded no-allocation build, multi-toolchain build-and-test, example
//! rendering with pixel-wise golden comparison, documentation link check)
//! by their prerequisite edges, runs independent stages concurrently, and
//! skips everything downstream of a failure while unrelated branches run
//! to completion.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pixelgate::prelude::*;
//!
//! let manifest = PipelineManifest::default_pipeline();
//! let driver = Driver::new(manifest, DriverOptions::default());
//!
//! let report = driver.run().await?;
//! println!("{}", report.render());
//! std::process::exit(report.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod compare;
pub mod config;
pub mod core;
pub mod driver;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod runner;
pub mod stages;
pub mod toolchain;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::compare::{CompareConfig, ComparisonResult, DiffMetric};
    pub use crate::config::{MatrixDecl, PipelineManifest, RegressionDecl, StageDecl};
    pub use crate::core::{FailureReason, StageOutcome, StageStatus};
    pub use crate::driver::{Driver, DriverOptions};
    pub use crate::errors::{ConfigError, PixelgateError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{PipelineReport, StageGraph, StageReport, StageSpec};
    pub use crate::runner::{ExampleRunner, ExampleSpec, RunnerConfig};
    pub use crate::stages::{Action, CommandStage, RegressionStage, Stage, StageContext};
    pub use crate::toolchain::{Channel, ToolchainDescriptor};
}
