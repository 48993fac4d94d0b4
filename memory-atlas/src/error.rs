//! Error types for the atlas engine.

use thiserror::Error;

use crate::dataset::Algorithm;

/// Result type alias for atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Errors that can occur while loading, projecting or searching a dataset.
///
/// Session entry points never surface capability failures through this type;
/// they are folded into [`OperationStatus`](crate::session::OperationStatus).
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Reading a dataset or config file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset or config file was not valid JSON for its schema.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The dataset is structurally unusable.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// The algorithm has to be precomputed offline and the dataset carries no layout for it.
    #[error("{algorithm} cannot be computed inline; precompute it offline and include it in the dataset")]
    UnsupportedInlineComputation {
        /// Requested algorithm.
        algorithm: Algorithm,
    },

    /// The reduction capability failed.
    #[error("reduction failed: {0}")]
    Reduction(String),

    /// Vector lengths disagree where they must match.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// No vectors were provided.
    #[error("empty input: no vectors provided")]
    EmptyInput,

    /// Too few samples for the requested computation.
    #[error("insufficient data: need at least {min} samples, got {got}")]
    InsufficientData {
        /// Minimum sample count.
        min: usize,
        /// Provided sample count.
        got: usize,
    },

    /// An embedding provider failed.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
