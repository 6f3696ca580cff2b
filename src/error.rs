//! Error types for corruption-bench operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for corruption-bench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a robustness benchmark.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration (unknown architecture, missing weight source, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required file (catalog, shard, dataset, checkpoint) does not exist.
    #[error("Not found: {}", path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// Two collections that must line up do not.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being compared.
        what: String,
        /// Expected size or shape.
        expected: String,
        /// Actual size or shape.
        actual: String,
    },

    /// Operand has a shape the operation cannot handle.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Dataset index past the end.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Dataset length.
        len: usize,
    },

    /// Average requested from an accumulator that never saw an update.
    #[error("Average requested before any update")]
    EmptyAverage,

    /// Statistics requested on a batch with no samples.
    #[error("Empty batch")]
    EmptyBatch,

    /// Requested top-k is zero or exceeds the number of classes.
    #[error("Invalid top-k: k={k} with {classes} classes")]
    InvalidTopK {
        /// Requested k.
        k: usize,
        /// Number of classes in the logits.
        classes: usize,
    },

    /// Malformed `.npy` array file.
    #[error("Invalid array file {}: {reason}", path.display())]
    Npy {
        /// Path to the array file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Well-formed JSON that is neither a raw nor a wrapped checkpoint.
    #[error("Invalid checkpoint {}: {reason}", path.display())]
    Checkpoint {
        /// Path to the checkpoint.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// PNG encoding error.
    #[error("PNG error: {0}")]
    Png(#[from] png::EncodingError),
}

impl Error {
    /// Map an I/O error on `path` to [`Error::NotFound`] when the file is missing.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}
