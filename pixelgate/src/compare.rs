//! Pixel-wise image comparison against golden references.
//!
//! The comparator decodes both images to RGBA8 grids and aggregates
//! per-channel absolute deltas into a single integer score. Everything is
//! integer arithmetic over decoded bytes, so identical input byte streams
//! always yield identical scores across runs and platforms.

use crate::core::FailureReason;
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How per-pixel deltas are aggregated into the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMetric {
    /// Count of pixels where any channel differs.
    #[default]
    CountDifferent,
    /// Sum of absolute per-channel differences across all pixels.
    SumAbsolute,
}

/// Comparator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Aggregation metric.
    #[serde(default)]
    pub metric: DiffMetric,
    /// Maximum score that still passes. Zero means byte-for-byte equality
    /// of the decoded pixel grids.
    #[serde(default)]
    pub threshold: u64,
    /// Whether to materialize a difference image on failure.
    #[serde(default = "default_true")]
    pub write_diff_image: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            metric: DiffMetric::default(),
            threshold: 0,
            write_diff_image: true,
        }
    }
}

/// The result of comparing one candidate frame against its golden image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Aggregate error score.
    pub score: u64,
    /// The threshold the score was checked against.
    pub threshold: u64,
    /// Whether the score is within the threshold.
    pub passed: bool,
    /// Path of the materialized difference image, if one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<PathBuf>,
}

/// Errors from the comparator.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Golden and candidate dimensions differ; no partial compare is
    /// attempted.
    #[error("dimension mismatch: golden is {expected_width}x{expected_height}, candidate is {actual_width}x{actual_height}")]
    DimensionMismatch {
        /// Golden image width.
        expected_width: u32,
        /// Golden image height.
        expected_height: u32,
        /// Candidate image width.
        actual_width: u32,
        /// Candidate image height.
        actual_height: u32,
    },

    /// An image file could not be opened or decoded.
    #[error("cannot read image {path}: {source}")]
    Unreadable {
        /// The offending path.
        path: PathBuf,
        /// The underlying decode/open error.
        #[source]
        source: image::ImageError,
    },

    /// The difference image could not be written.
    #[error("cannot write difference image {path}: {source}")]
    DiffWrite {
        /// The offending path.
        path: PathBuf,
        /// The underlying encode error.
        #[source]
        source: image::ImageError,
    },
}

impl CompareError {
    /// Converts the error into a stage-level failure reason.
    #[must_use]
    pub fn into_failure_reason(self) -> FailureReason {
        match self {
            Self::DimensionMismatch {
                expected_width,
                expected_height,
                actual_width,
                actual_height,
            } => FailureReason::DimensionMismatch {
                expected: (expected_width, expected_height),
                actual: (actual_width, actual_height),
            },
            Self::Unreadable { path, .. } => FailureReason::ArtifactMissing { path },
            Self::DiffWrite { source, .. } => FailureReason::internal(source.to_string()),
        }
    }
}

/// Compares two decoded pixel grids.
///
/// # Errors
///
/// Returns [`CompareError::DimensionMismatch`] if the grids have different
/// dimensions; a partial compare is never attempted.
pub fn compare_images(
    golden: &RgbaImage,
    candidate: &RgbaImage,
    metric: DiffMetric,
) -> Result<u64, CompareError> {
    if golden.dimensions() != candidate.dimensions() {
        return Err(CompareError::DimensionMismatch {
            expected_width: golden.width(),
            expected_height: golden.height(),
            actual_width: candidate.width(),
            actual_height: candidate.height(),
        });
    }

    let mut score: u64 = 0;
    for (g, c) in golden.pixels().zip(candidate.pixels()) {
        match metric {
            DiffMetric::CountDifferent => {
                if g != c {
                    score += 1;
                }
            }
            DiffMetric::SumAbsolute => {
                for (gc, cc) in g.0.iter().zip(c.0.iter()) {
                    score += u64::from(gc.abs_diff(*cc));
                }
            }
        }
    }
    Ok(score)
}

/// Builds the difference image: one grey pixel per location, encoding the
/// largest channel deviation at that location.
#[must_use]
pub fn diff_image(golden: &RgbaImage, candidate: &RgbaImage) -> GrayImage {
    let mut diff = GrayImage::new(golden.width(), golden.height());
    for (x, y, pixel) in diff.enumerate_pixels_mut() {
        let g = golden.get_pixel(x, y);
        let c = candidate.get_pixel(x, y);
        let magnitude = g
            .0
            .iter()
            .zip(c.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0);
        *pixel = Luma([magnitude]);
    }
    diff
}

fn open_rgba(path: &Path) -> Result<RgbaImage, CompareError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| CompareError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Compares a candidate frame file against its golden file.
///
/// On a failed verdict, materializes the difference image at `diff_path`
/// (when enabled) so a human can diagnose where the frames diverge; the
/// verdict itself never depends on the difference image.
///
/// # Errors
///
/// Returns an error if either file cannot be decoded, the dimensions
/// differ, or the difference image cannot be written.
pub fn compare_files(
    golden_path: &Path,
    candidate_path: &Path,
    diff_path: &Path,
    config: &CompareConfig,
) -> Result<ComparisonResult, CompareError> {
    let golden = open_rgba(golden_path)?;
    let candidate = open_rgba(candidate_path)?;

    let score = compare_images(&golden, &candidate, config.metric)?;
    let passed = score <= config.threshold;

    let mut written_diff = None;
    if !passed && config.write_diff_image {
        if let Some(parent) = diff_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        diff_image(&golden, &candidate)
            .save(diff_path)
            .map_err(|source| CompareError::DiffWrite {
                path: diff_path.to_path_buf(),
                source,
            })?;
        written_diff = Some(diff_path.to_path_buf());
    }

    Ok(ComparisonResult {
        score,
        threshold: config.threshold,
        passed,
        diff_image: written_diff,
    })
}
