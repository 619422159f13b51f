//! Axis-aligned bounding boxes.

use std::fmt;

/// An axis-aligned box with inclusive bounds.
///
/// `min[i] <= max[i]` holds on every axis for boxes built through
/// [`Aabb::new`] or [`Aabb::from_corners`].
#[derive(Clone, Copy, PartialEq)]
pub struct Aabb {
    min: [f64; 3],
    max: [f64; 3],
}

impl Aabb {
    /// A box covering all of space. Used for the global default region.
    pub const EVERYWHERE: Self = Self {
        min: [f64::NEG_INFINITY; 3],
        max: [f64::INFINITY; 3],
    };

    /// Create a box from its minimum and maximum corners.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `min > max` on any axis.
    #[must_use]
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        debug_assert!(
            (0..3).all(|i| min[i] <= max[i]),
            "inverted box {min:?} .. {max:?}"
        );
        Self { min, max }
    }

    /// Create a box from two arbitrary opposite corners.
    #[must_use]
    pub fn from_corners(a: [f64; 3], b: [f64; 3]) -> Self {
        Self {
            min: [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])],
            max: [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])],
        }
    }

    /// A degenerate box around a single point.
    #[must_use]
    pub const fn point(p: [f64; 3]) -> Self {
        Self { min: p, max: p }
    }

    #[must_use]
    pub const fn min(&self) -> [f64; 3] {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> [f64; 3] {
        self.max
    }

    /// Whether the point lies inside the box (bounds inclusive).
    #[must_use]
    pub fn contains_point(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Whether `other` lies entirely inside this box.
    #[must_use]
    pub fn contains_box(&self, other: &Self) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Whether the two boxes share at least one point.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Smallest box enclosing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    /// Smallest box enclosing every box in the iterator, or `None` if empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a Self>) -> Option<Self> {
        boxes
            .into_iter()
            .copied()
            .reduce(|acc, b| acc.union(&b))
    }

    /// Volume of the box. Degenerate boxes have zero volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        (0..3).map(|i| self.max[i] - self.min[i]).product()
    }

    /// Sum of edge lengths, used to break volume ties between flat boxes.
    #[must_use]
    pub fn margin(&self) -> f64 {
        (0..3).map(|i| self.max[i] - self.min[i]).sum()
    }

    /// How much this box's volume grows when extended to cover `other`.
    #[must_use]
    pub fn enlargement(&self, other: &Self) -> f64 {
        self.union(other).volume() - self.volume()
    }

    /// Center of the box along one axis.
    #[must_use]
    pub fn center(&self, axis: usize) -> f64 {
        (self.min[axis] + self.max[axis]) * 0.5
    }
}

impl fmt::Debug for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Aabb([{}, {}, {}] .. [{}, {}, {}])",
            self.min[0], self.min[1], self.min[2], self.max[0], self.max[1], self.max[2]
        )
    }
}
