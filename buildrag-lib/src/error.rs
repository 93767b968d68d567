//! Error types for buildrag

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for buildrag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in buildrag operations
#[derive(Error, Debug)]
pub enum Error {
    /// The embedding model could not be loaded, reached, or answered too late
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A text in an embedding batch was rejected
    #[error("embedding error at batch element {index}: {reason}")]
    Embedding { index: usize, reason: String },

    /// A vector did not have the dimension the index was built with
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Failed to write an index to disk
    #[error("failed to persist index to {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    /// No index exists at the requested location
    #[error("no index found at {}; build it first with the ingest step", .0.display())]
    IndexNotFound(PathBuf),

    /// An index exists but cannot be reconstructed
    #[error("corrupt index at {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// Failed to read the raw document corpus
    #[error("corpus error at {}: {reason}", .path.display())]
    Corpus { path: PathBuf, reason: String },

    /// Invalid pipeline configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corpus(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corpus {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_names_both_sides() {
        let err = Error::DimensionMismatch {
            expected: 384,
            actual: 256,
        };
        let msg = err.to_string();
        assert!(msg.contains("384"));
        assert!(msg.contains("256"));
    }

    #[test]
    fn test_index_not_found_mentions_build_step() {
        let err = Error::IndexNotFound(PathBuf::from("embeddings/index"));
        let msg = err.to_string();
        assert!(msg.contains("embeddings/index"));
        assert!(msg.contains("ingest"));
    }
}
