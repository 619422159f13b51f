//! Regions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use warden_geom::{Aabb, Point, Shape, WorldId};

use crate::{FlagKey, FlagValue, Member, Subject};

/// Stable, unique region identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(Arc<str>);

impl RegionId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({})", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RegionId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Parent ids in declaration order. Most regions have at most one or two.
pub type Parents = SmallVec<[RegionId; 2]>;

/// A named volume in one world carrying flags.
///
/// Parents are plain ids. They may name regions that no longer exist;
/// such links are skipped during flag lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    id: RegionId,
    world: WorldId,
    shape: Shape,
    priority: i32,
    owners: BTreeSet<Member>,
    members: BTreeSet<Member>,
    flags: BTreeMap<FlagKey, FlagValue>,
    parents: Parents,
}

impl Region {
    /// New region with priority 0, no flags, members or parents.
    #[must_use]
    pub fn new(id: impl Into<RegionId>, world: impl Into<WorldId>, shape: Shape) -> Self {
        Self {
            id: id.into(),
            world: world.into(),
            shape,
            priority: 0,
            owners: BTreeSet::new(),
            members: BTreeSet::new(),
            flags: BTreeMap::new(),
            parents: Parents::new(),
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_flag(mut self, key: impl Into<FlagKey>, value: impl Into<FlagValue>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<RegionId>) -> Self {
        let parent = parent.into();
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Member) -> Self {
        self.owners.insert(owner);
        self
    }

    #[must_use]
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.insert(member);
        self
    }

    #[must_use]
    pub const fn id(&self) -> &RegionId {
        &self.id
    }

    #[must_use]
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Bounding box of the shape, in world coordinates.
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.shape.bounding_box()
    }

    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub const fn owners(&self) -> &BTreeSet<Member> {
        &self.owners
    }

    #[must_use]
    pub const fn members(&self) -> &BTreeSet<Member> {
        &self.members
    }

    #[must_use]
    pub const fn flags(&self) -> &BTreeMap<FlagKey, FlagValue> {
        &self.flags
    }

    #[must_use]
    pub fn flag(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key)
    }

    #[must_use]
    pub fn parents(&self) -> &[RegionId] {
        &self.parents
    }

    /// Whether the point is in this region's world and inside its shape.
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        self.world == *point.world() && self.shape.contains(point.coords())
    }

    /// Owners count as members.
    #[must_use]
    pub fn is_member(&self, subject: &dyn Subject) -> bool {
        self.owners
            .iter()
            .chain(&self.members)
            .any(|m| m.matches(subject))
    }

    #[must_use]
    pub fn is_owner(&self, subject: &dyn Subject) -> bool {
        self.owners.iter().any(|m| m.matches(subject))
    }

    pub(crate) fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
    }

    pub(crate) const fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub(crate) fn set_flag(&mut self, key: FlagKey, value: FlagValue) -> Option<FlagValue> {
        self.flags.insert(key, value)
    }

    pub(crate) fn clear_flag(&mut self, key: &str) -> Option<FlagValue> {
        self.flags.remove(key)
    }

    pub(crate) fn push_parent(&mut self, parent: RegionId) {
        self.parents.push(parent);
    }

    pub(crate) fn drop_parent(&mut self, parent: &RegionId) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| p != parent);
        self.parents.len() != before
    }

    pub(crate) fn members_mut(&mut self, owner: bool) -> &mut BTreeSet<Member> {
        if owner { &mut self.owners } else { &mut self.members }
    }
}
