//! Engine error types.

use thiserror::Error;
use warden_geom::ShapeError;
use warden_index::IndexError;
use warden_region::{RegionError, RegionId};

/// Engine error type.
///
/// Every failing operation leaves the engine state exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No region with this id.
    #[error("region not found: {0}")]
    NotFound(RegionId),

    /// A parent link would create a cycle.
    #[error("linking {parent} as parent of {child} would create a cycle")]
    Cycle { child: RegionId, parent: RegionId },

    /// A parent link would make an ancestor chain too long.
    #[error("linking {parent} as parent of {child} gives depth {depth}, max is {max}")]
    DepthExceeded {
        child: RegionId,
        parent: RegionId,
        depth: usize,
        max: usize,
    },

    /// Unlinking a parent that is not linked.
    #[error("{parent} is not a parent of {child}")]
    NotLinked { child: RegionId, parent: RegionId },

    /// Geometry was rejected.
    #[error("invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),

    /// A region with this id already exists.
    #[error("duplicate region id: {0}")]
    DuplicateId(RegionId),

    /// Startup validation failed: a registered flag has no definite global
    /// value, or the configuration is unusable.
    #[error("engine misconfigured: {0}")]
    Misconfigured(String),

    /// A batch import was rejected. Nothing from the batch was applied.
    #[error("import rejected at record {index} ({id}): {reason}")]
    ImportValidationFailed {
        index: usize,
        id: RegionId,
        reason: Box<EngineError>,
    },

    /// The spatial index disagreed with the region table.
    #[error("spatial index out of sync: {0}")]
    Index(#[from] IndexError),
}

/// Flat classification of [`EngineError`] for platform adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Cycle,
    DepthExceeded,
    InvalidShape,
    DuplicateId,
    Misconfigured,
    ImportValidationFailed,
}

impl EngineError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NotLinked { .. } | Self::Index(IndexError::NotFound) => {
                ErrorKind::NotFound
            }
            Self::Cycle { .. } => ErrorKind::Cycle,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::InvalidShape(_) => ErrorKind::InvalidShape,
            Self::DuplicateId(_) | Self::Index(IndexError::Duplicate) => ErrorKind::DuplicateId,
            Self::Misconfigured(_) | Self::Index(IndexError::InvalidParams(_)) => {
                ErrorKind::Misconfigured
            }
            Self::ImportValidationFailed { .. } => ErrorKind::ImportValidationFailed,
        }
    }
}

impl From<RegionError> for EngineError {
    fn from(err: RegionError) -> Self {
        match err {
            RegionError::NotFound(id) => Self::NotFound(id),
            RegionError::DuplicateId(id) => Self::DuplicateId(id),
            RegionError::Cycle { child, parent } => Self::Cycle { child, parent },
            RegionError::DepthExceeded {
                child,
                parent,
                depth,
                max,
            } => Self::DepthExceeded {
                child,
                parent,
                depth,
                max,
            },
            RegionError::NotLinked { child, parent } => Self::NotLinked { child, parent },
            RegionError::InvalidShape(err) => Self::InvalidShape(err),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
