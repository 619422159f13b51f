//! Shape validation errors.

use thiserror::Error;

/// Why a shape was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    /// A coordinate or radius is NaN or infinite.
    #[error("shape has a non-finite coordinate")]
    NonFinite,

    /// Polygon height range has `y_min > y_max`.
    #[error("inverted height range: y_min {y_min} > y_max {y_max}")]
    InvertedHeight { y_min: f64, y_max: f64 },

    /// Polygon with too few vertices.
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    /// Two consecutive polygon vertices coincide.
    #[error("polygon vertex {0} repeats the previous vertex")]
    RepeatedVertex(usize),

    /// All polygon vertices are collinear.
    #[error("polygon has zero area")]
    ZeroArea,

    /// Two polygon edges cross or overlap.
    #[error("polygon edges {0} and {1} intersect")]
    SelfIntersecting(usize, usize),

    /// Sphere radius must be positive.
    #[error("sphere radius must be positive, got {0}")]
    NonPositiveRadius(f64),
}
