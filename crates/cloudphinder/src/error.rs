//! Error types for cloud finding.
//!
//! Every failure is local to one dataset: a batch logs the error, skips the
//! dataset and keeps going. No partially assembled groups are ever handed to a
//! result sink.

use thiserror::Error;

/// Unified error type for all cloud-finding operations.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Too few particles to build neighbour lists of the requested length.
    ///
    /// `stage` is `"total"` for the raw particle count and `"dense"` for the
    /// count remaining after the density cut.
    #[error("not enough {stage} particles: {available} available, {required} required")]
    InsufficientData {
        stage: &'static str,
        available: usize,
        required: usize,
    },

    /// Two particles still share a position after duplicate separation.
    #[error("particles {first} and {second} share a position")]
    DegenerateGeometry { first: usize, second: usize },

    /// Malformed particle arrays.
    #[error("invalid particle data: {0}")]
    InvalidInput(String),

    /// Configuration validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors from result sinks and file-backed sources
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CloudError {
    /// Creates an input validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        CloudError::InvalidInput(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CloudError::Config(message.into())
    }

    /// Returns true if the dataset was skipped for lack of particles.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, CloudError::InsufficientData { .. })
    }
}

/// Result type alias for cloud-finding operations.
pub type Result<T> = std::result::Result<T, CloudError>;
