//! Index error types.

use thiserror::Error;

/// Spatial index error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The key is not in the index.
    #[error("key not found in spatial index")]
    NotFound,

    /// The key is already in the index.
    #[error("key already present in spatial index")]
    Duplicate,

    /// Node capacity parameters are unusable.
    #[error("invalid R-tree parameters: {0}")]
    InvalidParams(&'static str),
}
