//! The authoritative region table and parent graph.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::debug;
use warden_geom::Shape;

use crate::{
    FlagKey, FlagState, FlagValue, Member, Region, RegionError, RegionId, RegionResult, Subject,
};

/// Default bound on ancestor chain length, counted in parent links.
pub const DEFAULT_MAX_PARENT_DEPTH: usize = 16;

/// All regions by id, plus the reverse parent edges.
///
/// Regions are stored behind `Arc` so cloning the table (to prepare the
/// next snapshot) does not deep-copy any region; a mutation copies only the
/// region it touches.
///
/// The parent graph is kept acyclic and no ancestor chain is longer than
/// `max_depth` links. Parent ids of deleted regions are left in place and
/// skipped by lookups.
#[derive(Clone, Debug)]
pub struct RegionTable {
    regions: HashMap<RegionId, Arc<Region>>,
    /// parent id → ids of existing regions listing it as a parent. Keys may
    /// name regions that do not exist (yet, or any more).
    children: HashMap<RegionId, SmallVec<[RegionId; 4]>>,
    max_depth: usize,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARENT_DEPTH)
    }
}

impl RegionTable {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            regions: HashMap::new(),
            children: HashMap::new(),
            max_depth,
        }
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RegionId) -> Option<&Arc<Region>> {
        self.regions.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &RegionId) -> bool {
        self.regions.contains_key(id)
    }

    /// All regions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Region>> {
        self.regions.values()
    }

    fn get_mut(&mut self, id: &RegionId) -> RegionResult<&mut Region> {
        self.regions
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| RegionError::NotFound(id.clone()))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Add a region.
    ///
    /// Its parents may name regions that do not exist. Parents that do
    /// exist are checked for cycles and depth, including against existing
    /// regions that already list this id as a parent.
    pub fn insert(&mut self, region: Region) -> RegionResult<()> {
        let id = region.id().clone();
        if self.regions.contains_key(&id) {
            return Err(RegionError::DuplicateId(id));
        }
        for parent in region.parents() {
            self.check_link(&id, parent)?;
        }

        for parent in region.parents() {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(id.clone());
        }
        self.regions.insert(id, Arc::new(region));
        Ok(())
    }

    /// Remove a region and return it.
    ///
    /// Regions naming it as a parent keep the (now dangling) link.
    pub fn remove(&mut self, id: &RegionId) -> RegionResult<Arc<Region>> {
        let region = self
            .regions
            .remove(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))?;
        for parent in region.parents() {
            self.unlink_child(parent, id);
        }
        Ok(region)
    }

    fn unlink_child(&mut self, parent: &RegionId, child: &RegionId) {
        if let Some(list) = self.children.get_mut(parent) {
            list.retain(|c| c != child);
            if list.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    // ========================================================================
    // Field updates
    // ========================================================================

    /// Set a flag, returning the value it replaced.
    pub fn set_flag(
        &mut self,
        id: &RegionId,
        key: FlagKey,
        value: FlagValue,
    ) -> RegionResult<Option<FlagValue>> {
        Ok(self.get_mut(id)?.set_flag(key, value))
    }

    /// Remove a flag, returning the value it had.
    pub fn clear_flag(&mut self, id: &RegionId, key: &str) -> RegionResult<Option<FlagValue>> {
        Ok(self.get_mut(id)?.clear_flag(key))
    }

    /// Change the priority, returning the old one.
    pub fn set_priority(&mut self, id: &RegionId, priority: i32) -> RegionResult<i32> {
        let region = self.get_mut(id)?;
        let old = region.priority();
        region.set_priority(priority);
        Ok(old)
    }

    /// Add an owner (`owner == true`) or member. Returns whether it was new.
    pub fn add_member(&mut self, id: &RegionId, member: Member, owner: bool) -> RegionResult<bool> {
        Ok(self.get_mut(id)?.members_mut(owner).insert(member))
    }

    /// Remove an owner or member. Returns whether it was present.
    pub fn remove_member(
        &mut self,
        id: &RegionId,
        member: &Member,
        owner: bool,
    ) -> RegionResult<bool> {
        Ok(self.get_mut(id)?.members_mut(owner).remove(member))
    }

    /// Replace a region's shape, returning the old one.
    pub fn reshape(&mut self, id: &RegionId, shape: Shape) -> RegionResult<Shape> {
        let region = self.get_mut(id)?;
        let old = region.shape().clone();
        region.set_shape(shape);
        Ok(old)
    }

    // ========================================================================
    // Parent graph
    // ========================================================================

    /// Append `parent` to `child`'s parent list.
    ///
    /// Both must exist. Linking an existing parent again is a no-op. Fails
    /// with `Cycle` if `child` is `parent` or one of its ancestors, and with
    /// `DepthExceeded` if the link makes some ancestor chain too long; the
    /// graph is unchanged on failure.
    pub fn link_parent(&mut self, child: &RegionId, parent: &RegionId) -> RegionResult<()> {
        let Some(region) = self.regions.get(child) else {
            return Err(RegionError::NotFound(child.clone()));
        };
        if !self.regions.contains_key(parent) {
            return Err(RegionError::NotFound(parent.clone()));
        }
        if region.parents().contains(parent) {
            return Ok(());
        }

        self.check_link(child, parent)?;

        self.get_mut(child)?.push_parent(parent.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .push(child.clone());
        debug!(%child, %parent, "linked parent");
        Ok(())
    }

    /// Remove `parent` from `child`'s parent list. The parent need not
    /// exist any more.
    pub fn unlink_parent(&mut self, child: &RegionId, parent: &RegionId) -> RegionResult<()> {
        if !self.get_mut(child)?.drop_parent(parent) {
            return Err(RegionError::NotLinked {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        self.unlink_child(parent, child);
        debug!(%child, %parent, "unlinked parent");
        Ok(())
    }

    /// Check that making `parent` a parent of `child` keeps the graph
    /// acyclic and within the depth bound. `child` need not exist yet.
    pub fn check_link(&self, child: &RegionId, parent: &RegionId) -> RegionResult<()> {
        if self.reaches(parent, child) {
            return Err(RegionError::Cycle {
                child: child.clone(),
                parent: parent.clone(),
            });
        }

        let mut memo = HashMap::new();
        let up = self.height_up(parent, &mut memo);
        let mut memo = HashMap::new();
        let down = self.height_down(child, &mut memo);
        let depth = up + 1 + down;
        if depth > self.max_depth {
            return Err(RegionError::DepthExceeded {
                child: child.clone(),
                parent: parent.clone(),
                depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    /// Whether `target` is `from` or one of its ancestors.
    ///
    /// Dangling parent ids count: a deleted region's id can come back.
    fn reaches(&self, from: &RegionId, target: &RegionId) -> bool {
        let mut visited: HashSet<&RegionId> = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(region) = self.regions.get(id) {
                stack.extend(region.parents());
            }
        }
        false
    }

    /// Longest chain of existing ancestors above `id`, in links.
    fn height_up(&self, id: &RegionId, memo: &mut HashMap<RegionId, usize>) -> usize {
        if let Some(&h) = memo.get(id) {
            return h;
        }
        let height = self.regions.get(id).map_or(0, |region| {
            region
                .parents()
                .iter()
                .filter(|p| self.regions.contains_key(*p))
                .map(|p| 1 + self.height_up(p, memo))
                .max()
                .unwrap_or(0)
        });
        memo.insert(id.clone(), height);
        height
    }

    /// Longest chain of existing descendants below `id`, in links.
    fn height_down(&self, id: &RegionId, memo: &mut HashMap<RegionId, usize>) -> usize {
        if let Some(&h) = memo.get(id) {
            return h;
        }
        let height = self.children.get(id).map_or(0, |children| {
            children
                .iter()
                .map(|c| 1 + self.height_down(c, memo))
                .max()
                .unwrap_or(0)
        });
        memo.insert(id.clone(), height);
        height
    }

    /// Every existing region that has `id` as an ancestor, each once, in
    /// breadth-first order. Works for ids that do not exist.
    #[must_use]
    pub fn descendants(&self, id: &RegionId) -> Vec<RegionId> {
        let mut seen: HashSet<&RegionId> = HashSet::new();
        let mut out = Vec::new();
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for current in frontier {
                for child in self.children.get(current).into_iter().flatten() {
                    if seen.insert(child) {
                        out.push(child.clone());
                        next.push(child);
                    }
                }
            }
            frontier = next;
        }
        out
    }

    /// Every existing ancestor of `id`, each once, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: &RegionId) -> Vec<RegionId> {
        let mut seen: HashSet<&RegionId> = HashSet::new();
        let mut out = Vec::new();
        let mut frontier = vec![id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for current in frontier {
                let Some(region) = self.regions.get(current) else {
                    continue;
                };
                for parent in region.parents() {
                    if self.regions.contains_key(parent) && seen.insert(parent) {
                        out.push(parent.clone());
                        next.push(parent);
                    }
                }
            }
            frontier = next;
        }
        out
    }

    // ========================================================================
    // Flag lookup
    // ========================================================================

    /// Effective state of `key` on region `id`.
    pub fn effective_flag(
        &self,
        id: &RegionId,
        key: &str,
        subject: Option<&dyn Subject>,
    ) -> RegionResult<FlagState> {
        let region = self
            .regions
            .get(id)
            .ok_or_else(|| RegionError::NotFound(id.clone()))?;
        Ok(self.effective_flag_of(region, key, subject))
    }

    /// Effective state of `key` on `region`.
    ///
    /// The region's own value wins unless it is `Inherit` (or filtered out
    /// for the subject). Otherwise parents are tried depth-first in
    /// declaration order and the first definite answer wins. Missing
    /// parents are skipped. Group membership is judged against the region
    /// holding each value.
    ///
    /// An ancestor shared by several parents is searched once, unless it is
    /// reached again by a shorter chain.
    #[must_use]
    pub fn effective_flag_of(
        &self,
        region: &Region,
        key: &str,
        subject: Option<&dyn Subject>,
    ) -> FlagState {
        let mut reached = HashMap::new();
        reached.insert(region.id(), 0);
        self.lookup(region, key, subject, 0, &mut reached)
    }

    fn lookup<'a>(
        &'a self,
        region: &'a Region,
        key: &str,
        subject: Option<&dyn Subject>,
        depth: usize,
        reached: &mut HashMap<&'a RegionId, usize>,
    ) -> FlagState {
        if let Some(value) = region.flag(key) {
            let state = value.evaluate(subject, |s| region.is_member(s));
            if state.is_definite() {
                return state;
            }
        }
        if depth >= self.max_depth {
            return FlagState::Inherit;
        }
        for id in region.parents() {
            let Some(parent) = self.regions.get(id) else {
                continue;
            };
            if reached.get(id).is_some_and(|&d| d <= depth + 1) {
                continue;
            }
            reached.insert(id, depth + 1);
            let state = self.lookup(parent, key, subject, depth + 1, reached);
            if state.is_definite() {
                return state;
            }
        }
        FlagState::Inherit
    }
}
