//! Warden spatial index.
//!
//! Maps region keys to their bounding boxes for sub-linear candidate lookup.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SpatialIndex<K>                                             │
//! │    - one RTree per world                                     │
//! │    - key → (world, box) table for O(1) removal lookups       │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  RTree<K>                                                    │
//! │    - Arc-shared nodes: clone is O(1), writes copy one path   │
//! │    - quadratic or linear split, STR bulk loading             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries work on boxes only. A hit means "the box contains the point",
//! not "the shape does"; callers filter with exact shape tests.

mod error;
mod index;
mod rtree;

pub use error::IndexError;
pub use index::SpatialIndex;
pub use rtree::{Entry, RTree, RTreeParams, SplitStrategy};
