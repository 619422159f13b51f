//! Warden geometry primitives.
//!
//! Everything the spatial index and the resolver need to reason about space:
//!
//! - **Point**: a position inside a named world
//! - **Cell**: a point snapped to the block grid, used as the cache key
//! - **Aabb**: axis-aligned bounding box, the unit the R-tree works with
//! - **Shape**: the exact volume of a region (cuboid, polygon prism, sphere)
//!
//! Shapes are a closed sum type. The index only ever sees their bounding
//! boxes; exact `contains` tests happen afterwards, during resolution.

mod aabb;
mod cell;
mod error;
mod point;
mod shape;

pub use aabb::Aabb;
pub use cell::{Cell, CellGrid};
pub use error::ShapeError;
pub use point::{Point, WorldId};
pub use shape::{Coverage, Cuboid, Polygon, Shape, ShapeDescriptor, ShapeKind, Sphere};
