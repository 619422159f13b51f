//! Region shapes.
//!
//! A shape is one of three kinds, dispatched by `match` at the call sites
//! that need it (`bounding_box`, `contains`):
//!
//! ```text
//!   Cuboid   min/max corners, inclusive
//!   Polygon  2D outline in the x/z plane, extruded over [y_min, y_max]
//!   Sphere   center + radius
//! ```
//!
//! [`Shape::coverage`] classifies a whole box against the shape, which is
//! what lets the decision cache share one answer across a grid cell.
//!
//! Shapes can only be built through validating constructors, and the
//! bounding box is computed once at construction. Changing a region's
//! geometry means building a new `Shape`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Aabb, ShapeError};

/// Collinearity tolerance for polygon edge tests.
const EPSILON: f64 = 1e-9;

/// The exact volume of a region.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Cuboid(Cuboid),
    Polygon(Polygon),
    Sphere(Sphere),
}

/// Discriminant of a [`Shape`], for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Cuboid,
    Polygon,
    Sphere,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cuboid => "cuboid",
            Self::Polygon => "polygon",
            Self::Sphere => "sphere",
        })
    }
}

/// How a box relates to a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    /// Every point of the box is in the shape.
    Inside,
    /// No point of the box is in the shape.
    Outside,
    /// Some points are, or the test cannot tell.
    Partial,
}

impl Shape {
    /// Build a cuboid from two opposite corners given in any order.
    pub fn cuboid(a: [f64; 3], b: [f64; 3]) -> Result<Self, ShapeError> {
        Cuboid::new(a, b).map(Self::Cuboid)
    }

    /// Build a polygonal prism.
    pub fn polygon(vertices: Vec<[f64; 2]>, y_min: f64, y_max: f64) -> Result<Self, ShapeError> {
        Polygon::new(vertices, y_min, y_max).map(Self::Polygon)
    }

    /// Build a sphere.
    pub fn sphere(center: [f64; 3], radius: f64) -> Result<Self, ShapeError> {
        Sphere::new(center, radius).map(Self::Sphere)
    }

    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Cuboid(_) => ShapeKind::Cuboid,
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::Sphere(_) => ShapeKind::Sphere,
        }
    }

    /// Smallest axis-aligned box enclosing the shape.
    #[must_use]
    pub const fn bounding_box(&self) -> Aabb {
        match self {
            Self::Cuboid(c) => c.bounds,
            Self::Polygon(p) => p.bounds,
            Self::Sphere(s) => s.bounds,
        }
    }

    /// Exact containment test.
    #[must_use]
    pub fn contains(&self, p: [f64; 3]) -> bool {
        match self {
            Self::Cuboid(c) => c.bounds.contains_point(p),
            Self::Polygon(poly) => poly.contains(p),
            Self::Sphere(s) => s.contains(p),
        }
    }

    /// Classify a closed box against the shape.
    ///
    /// `Inside` and `Outside` are exact claims; anything the test cannot
    /// settle cheaply comes back `Partial`.
    #[must_use]
    pub fn coverage(&self, area: &Aabb) -> Coverage {
        if !self.bounding_box().intersects(area) {
            return Coverage::Outside;
        }
        match self {
            Self::Cuboid(c) if c.bounds.contains_box(area) => Coverage::Inside,
            Self::Cuboid(_) => Coverage::Partial,
            Self::Polygon(poly) => poly.coverage(area),
            Self::Sphere(s) => s.coverage(area),
        }
    }
}

/// Axis-aligned cuboid with inclusive corners.
#[derive(Clone, Debug, PartialEq)]
pub struct Cuboid {
    bounds: Aabb,
}

impl Cuboid {
    fn new(a: [f64; 3], b: [f64; 3]) -> Result<Self, ShapeError> {
        if !a.iter().chain(&b).all(|v| v.is_finite()) {
            return Err(ShapeError::NonFinite);
        }
        Ok(Self {
            bounds: Aabb::from_corners(a, b),
        })
    }

    #[must_use]
    pub const fn min(&self) -> [f64; 3] {
        self.bounds.min()
    }

    #[must_use]
    pub const fn max(&self) -> [f64; 3] {
        self.bounds.max()
    }
}

/// A simple polygon in the x/z plane extruded over a height range.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<[f64; 2]>,
    y_min: f64,
    y_max: f64,
    bounds: Aabb,
}

impl Polygon {
    fn new(vertices: Vec<[f64; 2]>, y_min: f64, y_max: f64) -> Result<Self, ShapeError> {
        if !(y_min.is_finite() && y_max.is_finite())
            || !vertices.iter().flatten().all(|v| v.is_finite())
        {
            return Err(ShapeError::NonFinite);
        }
        if y_min > y_max {
            return Err(ShapeError::InvertedHeight { y_min, y_max });
        }
        let n = vertices.len();
        if n < 3 {
            return Err(ShapeError::TooFewVertices(n));
        }
        for i in 0..n {
            if vertices[i] == vertices[(i + 1) % n] {
                return Err(ShapeError::RepeatedVertex((i + 1) % n));
            }
        }
        if signed_area(&vertices).abs() <= EPSILON {
            return Err(ShapeError::ZeroArea);
        }
        if let Some((a, b)) = find_self_intersection(&vertices) {
            return Err(ShapeError::SelfIntersecting(a, b));
        }

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_z, mut max_z) = (f64::INFINITY, f64::NEG_INFINITY);
        for &[x, z] in &vertices {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_z = min_z.min(z);
            max_z = max_z.max(z);
        }

        Ok(Self {
            bounds: Aabb::new([min_x, y_min, min_z], [max_x, y_max, max_z]),
            vertices,
            y_min,
            y_max,
        })
    }

    #[must_use]
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    #[must_use]
    pub const fn y_min(&self) -> f64 {
        self.y_min
    }

    #[must_use]
    pub const fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Even-odd crossing test in the x/z plane. Points on an edge count
    /// as inside.
    fn contains(&self, p: [f64; 3]) -> bool {
        self.bounds.contains_point(p) && self.contains_xz([p[0], p[2]])
    }

    fn contains_xz(&self, q: [f64; 2]) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + n - 1) % n];
            if on_segment(a, b, q) {
                return true;
            }
            if (a[1] > q[1]) != (b[1] > q[1]) {
                let cross_x = (b[0] - a[0]) * (q[1] - a[1]) / (b[1] - a[1]) + a[0];
                if q[0] < cross_x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    fn coverage(&self, area: &Aabb) -> Coverage {
        let (min, max) = (area.min(), area.max());
        let lo = [min[0], min[2]];
        let hi = [max[0], max[2]];
        let center = [(lo[0] + hi[0]) * 0.5, (lo[1] + hi[1]) * 0.5];
        let spans_height = min[1] >= self.y_min && max[1] <= self.y_max;

        // With the outline clear of the rectangle, the rectangle is all in
        // or all out, and its center says which.
        let padded_lo = lo.map(|v| v - EPSILON);
        let padded_hi = hi.map(|v| v + EPSILON);
        if self
            .edges()
            .all(|(a, b)| clip_segment(a, b, padded_lo, padded_hi).is_none())
        {
            return match (self.contains_xz(center), spans_height) {
                (false, _) => Coverage::Outside,
                (true, true) => Coverage::Inside,
                (true, false) => Coverage::Partial,
            };
        }

        // The outline may run along the rectangle's border; it just must
        // not cut through it.
        if spans_height
            && self.contains_xz(center)
            && self.edges().all(|(a, b)| !crosses_interior(a, b, lo, hi))
        {
            Coverage::Inside
        } else {
            Coverage::Partial
        }
    }
}

/// A ball around a center point.
#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    center: [f64; 3],
    radius: f64,
    bounds: Aabb,
}

impl Sphere {
    fn new(center: [f64; 3], radius: f64) -> Result<Self, ShapeError> {
        if !(center.iter().all(|v| v.is_finite()) && radius.is_finite()) {
            return Err(ShapeError::NonFinite);
        }
        if radius <= 0.0 {
            return Err(ShapeError::NonPositiveRadius(radius));
        }
        let [cx, cy, cz] = center;
        Ok(Self {
            center,
            radius,
            bounds: Aabb::new(
                [cx - radius, cy - radius, cz - radius],
                [cx + radius, cy + radius, cz + radius],
            ),
        })
    }

    #[must_use]
    pub const fn center(&self) -> [f64; 3] {
        self.center
    }

    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    fn contains(&self, p: [f64; 3]) -> bool {
        let dx = p[0] - self.center[0];
        let dy = p[1] - self.center[1];
        let dz = p[2] - self.center[2];
        dx * dx + dy * dy + dz * dz <= self.radius * self.radius
    }

    fn coverage(&self, area: &Aabb) -> Coverage {
        let (min, max) = (area.min(), area.max());
        let (mut near, mut far) = (0.0_f64, 0.0_f64);
        for i in 0..3 {
            let c = self.center[i];
            let to_near = c.clamp(min[i], max[i]) - c;
            let to_far = (c - min[i]).abs().max((max[i] - c).abs());
            near = to_near.mul_add(to_near, near);
            far = to_far.mul_add(to_far, far);
        }
        let r2 = self.radius * self.radius;
        if far <= r2 {
            Coverage::Inside
        } else if near > r2 {
            Coverage::Outside
        } else {
            Coverage::Partial
        }
    }
}

// ============================================================================
// Polygon helpers
// ============================================================================

fn signed_area(vertices: &[[f64; 2]]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let [x1, z1] = vertices[i];
            let [x2, z2] = vertices[(i + 1) % n];
            x1 * z2 - x2 * z1
        })
        .sum();
    twice * 0.5
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Whether `q` lies on the closed segment `a..b`.
fn on_segment(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> bool {
    let len = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
    if cross(a, b, q).abs() > EPSILON * len.max(1.0) {
        return false;
    }
    q[0] >= a[0].min(b[0]) - EPSILON
        && q[0] <= a[0].max(b[0]) + EPSILON
        && q[1] >= a[1].min(b[1]) - EPSILON
        && q[1] <= a[1].max(b[1]) + EPSILON
}

/// The part of segment `a..b` inside the closed rectangle `lo..hi`, if any.
fn clip_segment(
    a: [f64; 2],
    b: [f64; 2],
    lo: [f64; 2],
    hi: [f64; 2],
) -> Option<([f64; 2], [f64; 2])> {
    let d = [b[0] - a[0], b[1] - a[1]];
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for i in 0..2 {
        if d[i] == 0.0 {
            if a[i] < lo[i] || a[i] > hi[i] {
                return None;
            }
            continue;
        }
        let ta = (lo[i] - a[i]) / d[i];
        let tb = (hi[i] - a[i]) / d[i];
        t0 = t0.max(ta.min(tb));
        t1 = t1.min(ta.max(tb));
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| [t.mul_add(d[0], a[0]), t.mul_add(d[1], a[1])];
    Some((at(t0), at(t1)))
}

/// Whether segment `a..b` passes through the open interior of the
/// rectangle `lo..hi`.
///
/// The clipped piece is convex, so it reaches the interior exactly when
/// its midpoint does.
fn crosses_interior(a: [f64; 2], b: [f64; 2], lo: [f64; 2], hi: [f64; 2]) -> bool {
    clip_segment(a, b, lo, hi).is_some_and(|(p, q)| {
        let mid = [(p[0] + q[0]) * 0.5, (p[1] + q[1]) * 0.5];
        (0..2).all(|i| lo[i] < mid[i] && mid[i] < hi[i])
    })
}

/// Whether closed segments `p1..p2` and `p3..p4` share a point.
fn segments_intersect(p1: [f64; 2], p2: [f64; 2], p3: [f64; 2], p4: [f64; 2]) -> bool {
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    on_segment(p3, p4, p1)
        || on_segment(p3, p4, p2)
        || on_segment(p1, p2, p3)
        || on_segment(p1, p2, p4)
}

/// Returns the first pair of edges (by index) that cross, overlap or
/// double back on each other.
fn find_self_intersection(vertices: &[[f64; 2]]) -> Option<(usize, usize)> {
    let n = vertices.len();
    let edge = |i: usize| (vertices[i], vertices[(i + 1) % n]);

    for i in 0..n {
        // Adjacent edges share a vertex; they only conflict if the outline
        // folds back along itself.
        let (a, b) = edge(i);
        let (_, c) = edge((i + 1) % n);
        let turn = cross(a, b, c);
        let dot = (b[0] - a[0]) * (c[0] - b[0]) + (b[1] - a[1]) * (c[1] - b[1]);
        if turn.abs() <= EPSILON && dot < 0.0 {
            return Some((i, (i + 1) % n));
        }

        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = edge(j);
            if segments_intersect(a, b, c, d) {
                return Some((i, j));
            }
        }
    }
    None
}

// ============================================================================
// Descriptor
// ============================================================================

/// Serializable description of a shape, used by the ingestion and
/// persistence records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeDescriptor {
    Cuboid {
        min: [f64; 3],
        max: [f64; 3],
    },
    Polygon {
        vertices: Vec<[f64; 2]>,
        y_min: f64,
        y_max: f64,
    },
    Sphere {
        center: [f64; 3],
        radius: f64,
    },
}

impl TryFrom<ShapeDescriptor> for Shape {
    type Error = ShapeError;

    fn try_from(desc: ShapeDescriptor) -> Result<Self, Self::Error> {
        match desc {
            ShapeDescriptor::Cuboid { min, max } => Self::cuboid(min, max),
            ShapeDescriptor::Polygon {
                vertices,
                y_min,
                y_max,
            } => Self::polygon(vertices, y_min, y_max),
            ShapeDescriptor::Sphere { center, radius } => Self::sphere(center, radius),
        }
    }
}

impl From<&Shape> for ShapeDescriptor {
    fn from(shape: &Shape) -> Self {
        match shape {
            Shape::Cuboid(c) => Self::Cuboid {
                min: c.min(),
                max: c.max(),
            },
            Shape::Polygon(p) => Self::Polygon {
                vertices: p.vertices.clone(),
                y_min: p.y_min,
                y_max: p.y_max,
            },
            Shape::Sphere(s) => Self::Sphere {
                center: s.center,
                radius: s.radius,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Shape {
        Shape::polygon(
            vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            0.0,
            64.0,
        )
        .unwrap()
    }

    #[test]
    fn test_cuboid_corners_any_order() {
        let shape = Shape::cuboid([5.0, 5.0, 5.0], [0.0, 0.0, 0.0]).unwrap();

        assert_eq!(shape.bounding_box(), Aabb::new([0.0; 3], [5.0; 3]));
        assert!(shape.contains([0.0, 0.0, 0.0]));
        assert!(shape.contains([5.0, 5.0, 5.0]));
        assert!(!shape.contains([5.5, 0.0, 0.0]));
    }

    #[test]
    fn test_polygon_contains_interior_and_edges() {
        let shape = square();

        assert!(shape.contains([5.0, 10.0, 5.0]));
        assert!(shape.contains([0.0, 10.0, 5.0]));
        assert!(shape.contains([10.0, 10.0, 10.0]));
        assert!(!shape.contains([5.0, 65.0, 5.0]));
        assert!(!shape.contains([11.0, 10.0, 5.0]));
    }

    #[test]
    fn test_concave_polygon_excludes_notch() {
        // An L shape: the top-right quadrant is cut away.
        let shape = Shape::polygon(
            vec![
                [0.0, 0.0],
                [10.0, 0.0],
                [10.0, 5.0],
                [5.0, 5.0],
                [5.0, 10.0],
                [0.0, 10.0],
            ],
            0.0,
            10.0,
        )
        .unwrap();

        assert!(shape.contains([2.0, 1.0, 8.0]));
        assert!(shape.contains([8.0, 1.0, 2.0]));
        assert!(!shape.contains([8.0, 1.0, 8.0]));
        // The bounding box over-approximates the notch.
        assert!(shape.bounding_box().contains_point([8.0, 1.0, 8.0]));
    }

    #[test]
    fn test_polygon_validation() {
        assert_eq!(
            Shape::polygon(vec![[0.0, 0.0], [1.0, 0.0]], 0.0, 1.0),
            Err(ShapeError::TooFewVertices(2))
        );
        assert_eq!(
            Shape::polygon(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]], 0.0, 1.0),
            Err(ShapeError::ZeroArea)
        );
        assert_eq!(
            Shape::polygon(vec![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0]], 0.0, 1.0),
            Err(ShapeError::RepeatedVertex(1))
        );
        assert!(matches!(
            Shape::polygon(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], 5.0, 1.0),
            Err(ShapeError::InvertedHeight { .. })
        ));
    }

    #[test]
    fn test_bowtie_is_self_intersecting() {
        let result = Shape::polygon(
            vec![[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 5.0]],
            0.0,
            1.0,
        );
        assert_eq!(result, Err(ShapeError::SelfIntersecting(0, 2)));
    }

    #[test]
    fn test_sphere() {
        let shape = Shape::sphere([0.0, 64.0, 0.0], 3.0).unwrap();

        assert_eq!(
            shape.bounding_box(),
            Aabb::new([-3.0, 61.0, -3.0], [3.0, 67.0, 3.0])
        );
        assert!(shape.contains([0.0, 67.0, 0.0]));
        assert!(shape.contains([1.0, 65.0, 1.0]));
        // Inside the box corner but outside the ball.
        assert!(!shape.contains([2.9, 66.9, 2.9]));

        assert_eq!(
            Shape::sphere([0.0; 3], 0.0),
            Err(ShapeError::NonPositiveRadius(0.0))
        );
        assert_eq!(
            Shape::sphere([f64::NAN, 0.0, 0.0], 1.0),
            Err(ShapeError::NonFinite)
        );
    }

    #[test]
    fn test_bounding_box_encloses_shape() {
        let shapes = [
            square(),
            Shape::sphere([3.5, -2.0, 7.25], 4.5).unwrap(),
            Shape::cuboid([-3.0, 0.0, 2.0], [4.0, 9.0, -8.0]).unwrap(),
        ];

        for shape in &shapes {
            let bounds = shape.bounding_box();
            let [x0, y0, z0] = bounds.min();
            let [x1, y1, z1] = bounds.max();
            for i in 0..=20 {
                for j in 0..=20 {
                    for k in 0..=20 {
                        let t = |lo: f64, hi: f64, s: i32| {
                            lo - 1.0 + (hi - lo + 2.0) * f64::from(s) / 20.0
                        };
                        let p = [t(x0, x1, i), t(y0, y1, j), t(z0, z1, k)];
                        if shape.contains(p) {
                            assert!(bounds.contains_point(p), "{shape:?} escapes at {p:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_cuboid_coverage() {
        let shape = Shape::cuboid([0.0; 3], [10.0; 3]).unwrap();
        let cell = |x: f64| Aabb::new([x, 0.0, 0.0], [x + 1.0, 1.0, 1.0]);

        assert_eq!(shape.coverage(&cell(3.0)), Coverage::Inside);
        assert_eq!(shape.coverage(&cell(9.0)), Coverage::Inside);
        assert_eq!(shape.coverage(&cell(9.5)), Coverage::Partial);
        assert_eq!(shape.coverage(&cell(11.0)), Coverage::Outside);
    }

    #[test]
    fn test_sphere_coverage() {
        let shape = Shape::sphere([0.0; 3], 4.0).unwrap();

        let center = Aabb::new([-1.0; 3], [1.0; 3]);
        assert_eq!(shape.coverage(&center), Coverage::Inside);

        // In the bounding box's corner, clear of the ball.
        let corner = Aabb::new([3.5; 3], [4.0; 3]);
        assert_eq!(shape.coverage(&corner), Coverage::Outside);

        let rim = Aabb::new([3.0, 0.0, 0.0], [5.0, 1.0, 1.0]);
        assert_eq!(shape.coverage(&rim), Coverage::Partial);

        // Tiny sphere inside one block.
        let tiny = Shape::sphere([0.5, 64.5, 0.5], 0.45).unwrap();
        let block = Aabb::new([0.0, 64.0, 0.0], [1.0, 65.0, 1.0]);
        assert_eq!(tiny.coverage(&block), Coverage::Partial);
    }

    #[test]
    fn test_polygon_coverage() {
        let l_shape = Shape::polygon(
            vec![
                [0.0, 0.0],
                [10.0, 0.0],
                [10.0, 5.0],
                [5.0, 5.0],
                [5.0, 10.0],
                [0.0, 10.0],
            ],
            0.0,
            10.0,
        )
        .unwrap();
        let cell = |x: f64, z: f64| Aabb::new([x, 1.0, z], [x + 1.0, 2.0, z + 1.0]);

        assert_eq!(l_shape.coverage(&cell(2.0, 2.0)), Coverage::Inside);
        // Edges along the cell border do not cut it.
        assert_eq!(l_shape.coverage(&cell(0.0, 0.0)), Coverage::Inside);
        assert_eq!(l_shape.coverage(&cell(4.0, 8.0)), Coverage::Inside);
        // In the notch, inside the bounding box.
        assert_eq!(l_shape.coverage(&cell(7.0, 7.0)), Coverage::Outside);
        assert_eq!(l_shape.coverage(&cell(4.5, 7.0)), Coverage::Partial);
        // Sticks out above the prism.
        let tall = Aabb::new([2.0, 9.5, 2.0], [3.0, 10.5, 3.0]);
        assert_eq!(l_shape.coverage(&tall), Coverage::Partial);

        let triangle =
            Shape::polygon(vec![[0.0, 0.0], [16.0, 0.0], [0.0, 16.0]], 0.0, 32.0).unwrap();
        let diagonal = Aabb::new([7.0, 0.0, 7.0], [9.0, 16.0, 9.0]);
        assert_eq!(triangle.coverage(&diagonal), Coverage::Partial);
    }

    #[test]
    fn test_descriptor_json_layout() {
        let desc = ShapeDescriptor::from(&Shape::sphere([1.0, 2.0, 3.0], 0.1).unwrap());
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"sphere","center":[1.0,2.0,3.0],"radius":0.1}"#
        );

        let back: ShapeDescriptor = serde_json::from_str(&json).unwrap();
        let shape = Shape::try_from(back).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Sphere);
    }

    #[test]
    fn test_descriptor_rejects_malformed() {
        let desc: ShapeDescriptor = serde_json::from_str(
            r#"{"kind":"polygon","vertices":[[0,0],[1,1]],"y_min":0,"y_max":4}"#,
        )
        .unwrap();
        assert_eq!(Shape::try_from(desc), Err(ShapeError::TooFewVertices(2)));
    }
}
