//! Region model error types.

use thiserror::Error;
use warden_geom::ShapeError;

use crate::RegionId;

/// Region table error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// No region with this id.
    #[error("region not found: {0}")]
    NotFound(RegionId),

    /// A region with this id already exists.
    #[error("duplicate region id: {0}")]
    DuplicateId(RegionId),

    /// The link would make `child` its own ancestor.
    #[error("linking {parent} as parent of {child} would create a cycle")]
    Cycle { child: RegionId, parent: RegionId },

    /// The link would make an ancestor chain longer than allowed.
    #[error("linking {parent} as parent of {child} gives depth {depth}, max is {max}")]
    DepthExceeded {
        child: RegionId,
        parent: RegionId,
        depth: usize,
        max: usize,
    },

    /// `parent` is not a parent of `child`.
    #[error("{parent} is not a parent of {child}")]
    NotLinked { child: RegionId, parent: RegionId },

    /// Geometry was rejected.
    #[error("invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),
}

/// Result type for region table operations.
pub type RegionResult<T> = Result<T, RegionError>;
