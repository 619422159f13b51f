//! World identifiers and points.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a world (dimension), e.g. `minecraft:overworld`.
///
/// Backed by an `Arc<str>`: clones share one allocation, but building an
/// id from a string allocates.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(Arc<str>);

impl WorldId {
    /// Create a world id from any string-like value.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the world name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorldId({})", self.0)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for WorldId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// An immutable position inside a world.
///
/// Equality and hashing cover all four fields. Coordinates are compared by
/// bit pattern after folding `-0.0` into `0.0`, so `Point` can be used as a
/// map key.
#[derive(Clone)]
pub struct Point {
    world: WorldId,
    x: f64,
    y: f64,
    z: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub fn new(world: impl Into<WorldId>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// World this point lives in.
    #[must_use]
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// Coordinates as an array, in x/y/z order.
    #[must_use]
    pub const fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Whether every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn key_bits(&self) -> [u64; 3] {
        [canonical_bits(self.x), canonical_bits(self.y), canonical_bits(self.z)]
    }
}

/// Bit pattern with `-0.0` folded into `0.0`.
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.world == other.world && self.key_bits() == other.key_bits()
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.world.hash(state);
        self.key_bits().hash(state);
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({} {}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of(p: &Point) -> u64 {
        let mut hasher = DefaultHasher::new();
        p.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_covers_world() {
        let a = Point::new("overworld", 1.0, 2.0, 3.0);
        let b = Point::new("nether", 1.0, 2.0, 3.0);
        let c = Point::new("overworld", 1.0, 2.0, 3.0);

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(hash_of(&a), hash_of(&c));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let a = Point::new("overworld", 0.0, -0.0, 0.0);
        let b = Point::new("overworld", -0.0, 0.0, 0.0);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_is_finite() {
        assert!(Point::new("w", -1.5, 0.0, 1e300).is_finite());
        assert!(!Point::new("w", f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Point::new("w", 0.0, 0.0, f64::NEG_INFINITY).is_finite());
    }

    #[test]
    fn test_world_id_serializes_as_string() {
        let world = WorldId::new("minecraft:the_end");
        let json = serde_json::to_string(&world).unwrap();
        assert_eq!(json, "\"minecraft:the_end\"");

        let back: WorldId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, world);
    }
}
