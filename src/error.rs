//! Error and failure types shared across the extraction pipeline.
//!
//! Per-image problems are `FailureReason`s: they end up in the record's
//! method column and never stop a pass. Only `StoreError` aborts a pass.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single image could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("image could not be loaded: {0}")]
    ImageLoad(String),
    #[error("image file not found in source folder")]
    ImageNotFound,
    #[error("crop produced an empty image")]
    EmptyCrop,
    #[error("no coordinate pattern matched")]
    NoPatternMatched,
}

impl FailureReason {
    /// Tag written to the `extraction_method` column.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureReason::ImageLoad(_) => "image_load_error",
            FailureReason::ImageNotFound => "image_not_found",
            FailureReason::EmptyCrop => "empty_crop",
            FailureReason::NoPatternMatched => "no_pattern_matched",
        }
    }
}

/// Record table could not be read or written. Fatal for the pass.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open record table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write record table {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record table {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Configuration values that cannot drive a run.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("pass list is empty")]
    NoPasses,
    #[error("pass '{pass}' has crop fraction {fraction}, expected (0, 1]")]
    CropFraction { pass: String, fraction: f64 },
    #[error("pass '{pass}' has scale factor {factor}, expected (0, 1]")]
    ScaleFactor { pass: String, factor: f32 },
    #[error("pass '{pass}' defines no cascade steps")]
    EmptyCascade { pass: String },
    #[error("duplicate pass name '{0}'")]
    DuplicatePass(String),
    #[error("city '{0}' has inverted bounds")]
    InvertedBounds(String),
    #[error("start pass {start} is outside 1..={count}")]
    StartPass { start: usize, count: usize },
}
