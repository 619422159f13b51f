//! Cache error types.

use thiserror::Error;

/// Cache error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Configuration values are unusable.
    #[error("invalid cache config: {0}")]
    InvalidConfig(&'static str),
}
