//! Per-world spatial index.

use std::fmt;
use std::hash::Hash;

use hashbrown::HashMap;
use tracing::{debug, warn};
use warden_geom::{Aabb, Point, WorldId};

use crate::{Entry, IndexError, RTree, RTreeParams};

/// Spatial index keyed by region id, one R-tree per world.
///
/// Cloning copies the key table and bumps one `Arc` per tree, so readers
/// can hold an old clone while a writer prepares the next one.
#[derive(Clone, Debug)]
pub struct SpatialIndex<K> {
    trees: HashMap<WorldId, RTree<K>>,
    entries: HashMap<K, (WorldId, Aabb)>,
    params: RTreeParams,
}

impl<K: Clone + Eq + Hash + fmt::Debug> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self::new(RTreeParams::default())
    }
}

impl<K: Clone + Eq + Hash + fmt::Debug> SpatialIndex<K> {
    #[must_use]
    pub fn new(params: RTreeParams) -> Self {
        Self {
            trees: HashMap::new(),
            entries: HashMap::new(),
            params,
        }
    }

    /// Build an index from `(key, world, box)` triples with STR packing.
    ///
    /// Fails with [`IndexError::Duplicate`] if a key appears twice.
    pub fn bulk_load(
        items: impl IntoIterator<Item = (K, WorldId, Aabb)>,
        params: RTreeParams,
    ) -> Result<Self, IndexError> {
        let mut entries = HashMap::new();
        let mut per_world: HashMap<WorldId, Vec<Entry<K>>> = HashMap::new();

        for (key, world, bounds) in items {
            if entries
                .insert(key.clone(), (world.clone(), bounds))
                .is_some()
            {
                return Err(IndexError::Duplicate);
            }
            per_world
                .entry(world)
                .or_default()
                .push(Entry { key, bounds });
        }

        let trees: HashMap<_, _> = per_world
            .into_iter()
            .map(|(world, list)| (world, RTree::bulk_load(list, params)))
            .collect();

        debug!(
            regions = entries.len(),
            worlds = trees.len(),
            "bulk loaded spatial index"
        );

        Ok(Self {
            trees,
            entries,
            params,
        })
    }

    #[must_use]
    pub const fn params(&self) -> &RTreeParams {
        &self.params
    }

    /// Number of indexed keys across all worlds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// World and box a key is indexed under.
    #[must_use]
    pub fn bounds_of(&self, key: &K) -> Option<(&WorldId, &Aabb)> {
        self.entries.get(key).map(|(world, bounds)| (world, bounds))
    }

    /// Index a key. Fails if the key is already present.
    pub fn insert(&mut self, key: K, world: WorldId, bounds: Aabb) -> Result<(), IndexError> {
        if self.entries.contains_key(&key) {
            return Err(IndexError::Duplicate);
        }
        let params = self.params;
        self.trees
            .entry(world.clone())
            .or_insert_with(|| RTree::new(params))
            .insert(key.clone(), bounds);
        self.entries.insert(key, (world, bounds));
        Ok(())
    }

    /// Stop indexing a key, returning the world and box it had.
    ///
    /// Removing a key that is not indexed changes nothing and fails with
    /// [`IndexError::NotFound`].
    pub fn remove(&mut self, key: &K) -> Result<(WorldId, Aabb), IndexError> {
        let Some((world, bounds)) = self.entries.remove(key) else {
            warn!(?key, "remove of a key that is not indexed");
            return Err(IndexError::NotFound);
        };

        let removed = self
            .trees
            .get_mut(&world)
            .is_some_and(|tree| tree.remove(key, &bounds));
        if !removed {
            // The key table and the tree disagree; the key table wins.
            warn!(?key, %world, "indexed key missing from its world tree");
        }

        if self.trees.get(&world).is_some_and(RTree::is_empty) {
            self.trees.remove(&world);
        }
        Ok((world, bounds))
    }

    /// Move a key to a new box, possibly in another world.
    pub fn update(&mut self, key: &K, world: WorldId, bounds: Aabb) -> Result<(), IndexError> {
        self.remove(key)?;
        self.insert(key.clone(), world, bounds)
    }

    /// Call `f` for every key whose box contains `point`.
    pub fn for_each_at(&self, point: &Point, f: impl FnMut(&K)) {
        if let Some(tree) = self.trees.get(point.world()) {
            tree.for_each_containing(point.coords(), f);
        }
    }

    /// Keys whose box contains `point`.
    #[must_use]
    pub fn query_point(&self, point: &Point) -> Vec<K> {
        let mut out = Vec::new();
        self.for_each_at(point, |k| out.push(k.clone()));
        out
    }

    /// Call `f` for every key in `world` whose box intersects `area`.
    pub fn for_each_in(&self, world: &WorldId, area: &Aabb, f: impl FnMut(&K)) {
        if let Some(tree) = self.trees.get(world) {
            tree.for_each_intersecting(area, f);
        }
    }

    /// Keys in `world` whose box intersects `area`.
    #[must_use]
    pub fn query_box(&self, world: &WorldId, area: &Aabb) -> Vec<K> {
        self.trees
            .get(world)
            .map(|tree| tree.query_box(area))
            .unwrap_or_default()
    }

    /// Worlds that currently hold at least one key.
    pub fn worlds(&self) -> impl Iterator<Item = &WorldId> {
        self.trees.keys()
    }

    /// Check every tree's invariants and that the key table matches.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut total = 0;
        for (world, tree) in &self.trees {
            tree.check_invariants()
                .map_err(|e| format!("world {world}: {e}"))?;
            total += tree.len();
        }
        if total != self.entries.len() {
            return Err(format!(
                "trees hold {total} entries but key table holds {}",
                self.entries.len()
            ));
        }
        Ok(())
    }
}
