//! Quantization of points onto the block grid.

use crate::{Aabb, Point, WorldId};

/// Largest cell coordinate magnitude that converts to `i64` exactly.
const MAX_CELL_COORD: f64 = 9_007_199_254_740_992.0;

/// A point snapped to a grid cell.
///
/// Cells are what the decision cache is keyed by. A cell spans
/// `[origin, origin + cell_size)` on every axis.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub world: WorldId,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Maps world coordinates to cells of a fixed edge length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellGrid {
    cell_size: f64,
}

impl Default for CellGrid {
    fn default() -> Self {
        Self::BLOCK
    }
}

impl CellGrid {
    /// One cell per block.
    pub const BLOCK: Self = Self { cell_size: 1.0 };

    /// Create a grid with the given cell edge length.
    ///
    /// Returns `None` unless `cell_size` is finite and positive.
    #[must_use]
    pub fn new(cell_size: f64) -> Option<Self> {
        (cell_size.is_finite() && cell_size > 0.0).then_some(Self { cell_size })
    }

    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Get the cell containing a point.
    ///
    /// Returns `None` for points with a non-finite coordinate or too far
    /// out for the cell coordinates to be exact.
    #[must_use]
    pub fn cell_at(&self, point: &Point) -> Option<Cell> {
        let snap = |v: f64| {
            let c = (v / self.cell_size).floor();
            (c.is_finite() && c.abs() < MAX_CELL_COORD).then_some(c as i64)
        };
        Some(Cell {
            world: point.world().clone(),
            x: snap(point.x())?,
            y: snap(point.y())?,
            z: snap(point.z())?,
        })
    }

    /// Coordinates of a cell's minimum corner.
    #[must_use]
    pub fn origin_coords(&self, cell: &Cell) -> [f64; 3] {
        [
            cell.x as f64 * self.cell_size,
            cell.y as f64 * self.cell_size,
            cell.z as f64 * self.cell_size,
        ]
    }

    /// Closed box around a cell. Every point the cell holds lies in it.
    #[must_use]
    pub fn bounds(&self, cell: &Cell) -> Aabb {
        let min = self.origin_coords(cell);
        Aabb::new(min, min.map(|v| v + self.cell_size))
    }

    /// Whether any point of the cell may lie in `bounds`.
    #[must_use]
    pub fn touches(&self, cell: &Cell, bounds: &Aabb) -> bool {
        self.bounds(cell).intersects(bounds)
    }
}
