//! Core domain model types for pixelgate.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - Stage status enum with its transition rules
//! - Stage outcome type with factory methods
//! - Structured failure reasons

mod outcome;
mod reason;
mod status;

pub use outcome::StageOutcome;
pub use reason::FailureReason;
pub use status::StageStatus;
