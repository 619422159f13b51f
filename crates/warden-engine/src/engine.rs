//! The engine: snapshot publication, resolution and mutations.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use warden_cache::{CacheKey, CacheStats, DecisionCache};
use warden_geom::{Aabb, CellGrid, Point, Shape, WorldId};
use warden_index::SpatialIndex;
use warden_region::{
    FlagKey, FlagRegistry, FlagState, FlagValue, Member, Region, RegionId, RegionRecord,
    RegionTable, Subject,
};

use crate::import::{self, Parents};
use crate::snapshot::Snapshot;
use crate::{
    Decision, DecisionSource, EngineConfig, EngineError, EngineResult, EngineState, ErrorKind,
    QueryResult,
};

/// Cache entries a committed mutation makes stale.
enum Invalidation {
    Areas(Vec<(WorldId, Aabb)>),
    All,
}

/// Region-protection engine.
///
/// Reads never block on writes: they run against the snapshot published
/// when they started. Writes are serialized; each one builds the next
/// snapshot off to the side and publishes it atomically, or publishes
/// nothing if it fails.
pub struct Engine {
    config: EngineConfig,
    registry: FlagRegistry,
    grid: CellGrid,
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    cache: DecisionCache<Decision>,
    /// Flags already reported as falling back to the unknown-flag verdict.
    fallback_warned: Mutex<HashSet<FlagKey>>,
}

impl Engine {
    /// Start an engine with no regions.
    pub fn new(config: EngineConfig, registry: FlagRegistry) -> EngineResult<Self> {
        Self::from_state(config, registry, EngineState::default())
    }

    /// Start an engine from persisted state.
    ///
    /// Every registered flag needs a definite global value, either from
    /// `state` or from its registered default. Parents missing from
    /// `state` are kept as dangling links.
    pub fn from_state(
        config: EngineConfig,
        registry: FlagRegistry,
        state: EngineState,
    ) -> EngineResult<Self> {
        config.validate()?;
        let global = seed_global(&registry, state.global)?;

        let mut table = RegionTable::new(config.max_parent_depth);
        import::stage(state.regions, &mut table, Parents::MayDangle)?;
        let index = build_index(&table, &config)?;

        let snapshot = Snapshot {
            generation: 0,
            table,
            index,
            global,
        };
        snapshot.check_consistency().map_err(EngineError::Misconfigured)?;

        let grid = config.grid();
        info!(
            regions = snapshot.table.len(),
            worlds = snapshot.index.worlds().count(),
            flags = registry.len(),
            cell_size = grid.cell_size(),
            "engine started"
        );

        Ok(Self {
            cache: DecisionCache::new(config.cache, grid),
            config,
            registry,
            grid,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            fallback_warned: Mutex::new(HashSet::new()),
        })
    }

    /// Stop the engine, returning its final state for persistence.
    pub fn shutdown(self) -> EngineState {
        let state = self.export_state();
        let stats = self.cache.stats();
        self.cache.clear();
        info!(
            regions = state.regions.len(),
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            "engine stopped"
        );
        state
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &FlagRegistry {
        &self.registry
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Generation of the published snapshot. Starts at 0 and grows by one
    /// per committed mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Decide `flag` at `point` for an anonymous query.
    ///
    /// The answer is cached for the point's whole cell only when every
    /// region near the cell either covers all of it or none of it.
    /// Points with a non-finite coordinate get the global default and are
    /// never cached.
    pub fn resolve(&self, point: &Point, flag: &FlagKey) -> Decision {
        let Some(cell) = self.grid.cell_at(point) else {
            return self.decide(&self.snapshot(), point, flag.as_str(), None);
        };
        let key = CacheKey::new(cell, flag.clone());
        if let Some(decision) = self.cache.get(&key) {
            return decision;
        }

        let snapshot = self.snapshot();
        let decision = self.decide(&snapshot, point, flag.as_str(), None);
        if snapshot.is_uniform(&key.cell.world, &self.grid.bounds(&key.cell)) {
            self.cache.put(key, decision.clone(), snapshot.generation);
        }
        decision
    }

    /// Decide `flag` at `point` for `subject`, honoring member groups and
    /// exemptions. Not cached.
    pub fn resolve_for(&self, point: &Point, flag: &FlagKey, subject: &dyn Subject) -> Decision {
        self.decide(&self.snapshot(), point, flag.as_str(), Some(subject))
    }

    /// Adapter entry point: [`Engine::resolve`] over plain values.
    pub fn query(&self, world: &str, x: f64, y: f64, z: f64, flag: &str) -> QueryResult {
        self.resolve(&Point::new(world, x, y, z), &FlagKey::new(flag))
            .into()
    }

    fn decide(
        &self,
        snapshot: &Snapshot,
        point: &Point,
        flag: &str,
        subject: Option<&dyn Subject>,
    ) -> Decision {
        snapshot
            .resolve(point, flag, subject, self.config.tie_break)
            .unwrap_or_else(|| self.fallback(flag))
    }

    fn fallback(&self, flag: &str) -> Decision {
        let verdict = self.config.unknown_flag_verdict;
        let mut warned = self.fallback_warned.lock();
        if !warned.contains(flag) {
            warned.insert(FlagKey::new(flag));
            warn!(flag, %verdict, "flag has no value anywhere, using fallback verdict");
        }
        Decision {
            verdict,
            source: DecisionSource::Fallback,
        }
    }

    /// Ids of the regions containing a point, highest priority first, ties
    /// by id.
    pub fn regions_at(&self, world: &str, x: f64, y: f64, z: f64) -> Vec<RegionId> {
        self.regions_at_point(&Point::new(world, x, y, z))
    }

    pub fn regions_at_point(&self, point: &Point) -> Vec<RegionId> {
        self.snapshot()
            .covering(point)
            .iter()
            .map(|r| r.id().clone())
            .collect()
    }

    /// Effective state of `flag` on region `id`, following parents.
    pub fn effective_flag(&self, id: &RegionId, flag: &str) -> EngineResult<FlagState> {
        Ok(self.snapshot().table.effective_flag(id, flag, None)?)
    }

    #[must_use]
    pub fn region(&self, id: &RegionId) -> Option<Arc<Region>> {
        self.snapshot().table.get(id).cloned()
    }

    /// Every region, sorted by id.
    #[must_use]
    pub fn regions(&self) -> Vec<Arc<Region>> {
        let snapshot = self.snapshot();
        let mut out: Vec<_> = snapshot.table.iter().cloned().collect();
        out.sort_unstable_by(|a, b| a.id().cmp(b.id()));
        out
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.snapshot().table.len()
    }

    /// Region ids whose ancestor chain includes `id`.
    #[must_use]
    pub fn descendants(&self, id: &RegionId) -> Vec<RegionId> {
        self.snapshot().table.descendants(id)
    }

    /// Existing ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: &RegionId) -> Vec<RegionId> {
        self.snapshot().table.ancestors(id)
    }

    /// The global default value for `flag`.
    #[must_use]
    pub fn global_flag(&self, flag: &str) -> Option<FlagValue> {
        self.snapshot().global.get(flag).cloned()
    }

    /// Check that the spatial index matches the region table.
    pub fn verify_integrity(&self) -> Result<(), String> {
        self.snapshot().check_consistency()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Run `f` against a copy of the current snapshot and publish the copy
    /// as the next generation. Nothing is published if `f` fails.
    fn mutate<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Snapshot) -> EngineResult<(T, Invalidation)>,
    ) -> EngineResult<T> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let mut next = Snapshot::clone(&current);
        next.generation = current.generation + 1;

        let (out, invalidation) = f(&mut next).inspect_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                warn!(op, error = %e, "mutation on missing region");
            } else {
                debug!(op, error = %e, "mutation rejected");
            }
        })?;

        let generation = next.generation;
        let removed = match invalidation {
            Invalidation::Areas(areas) => self.cache.invalidate_boxes(&areas, generation),
            Invalidation::All => self.cache.invalidate_all(generation),
        };
        *self.current.write() = Arc::new(next);

        debug!(op, generation, invalidated = removed, "mutation committed");
        Ok(out)
    }

    /// Add a region. Its parents must already exist.
    pub fn create_region(&self, region: Region) -> EngineResult<()> {
        self.mutate("create_region", |s| {
            if let Some(missing) = region.parents().iter().find(|p| !s.table.contains(p)) {
                return Err(EngineError::NotFound(missing.clone()));
            }
            let id = region.id().clone();
            let world = region.world().clone();
            let bounds = region.bounds();
            s.table.insert(region)?;
            s.index.insert(id.clone(), world, bounds)?;
            Ok(((), Invalidation::Areas(s.affected_areas(&id))))
        })
    }

    /// Add a region from its record form.
    pub fn create_region_from_record(&self, record: RegionRecord) -> EngineResult<()> {
        self.create_region(record.into_region()?)
    }

    /// Remove a region and return it. Children keep a dangling link.
    pub fn delete_region(&self, id: &RegionId) -> EngineResult<Arc<Region>> {
        self.mutate("delete_region", |s| {
            let areas = s.affected_areas(id);
            let region = s.table.remove(id)?;
            s.index.remove(id)?;
            Ok((region, Invalidation::Areas(areas)))
        })
    }

    /// Replace a region's shape, returning the old one.
    pub fn reshape_region(&self, id: &RegionId, shape: Shape) -> EngineResult<Shape> {
        self.mutate("reshape_region", |s| {
            let old = s.table.reshape(id, shape)?;
            let region = s
                .table
                .get(id)
                .ok_or_else(|| EngineError::NotFound(id.clone()))?;
            let world = region.world().clone();
            let bounds = region.bounds();
            s.index.update(id, world.clone(), bounds)?;

            let areas = vec![(world.clone(), old.bounding_box()), (world, bounds)];
            Ok((old, Invalidation::Areas(areas)))
        })
    }

    /// Set a flag on a region, returning the value it replaced.
    pub fn set_flag(
        &self,
        id: &RegionId,
        flag: impl Into<FlagKey>,
        value: impl Into<FlagValue>,
    ) -> EngineResult<Option<FlagValue>> {
        let flag = flag.into();
        let value = value.into();
        self.mutate("set_flag", |s| {
            let old = s.table.set_flag(id, flag, value)?;
            Ok((old, Invalidation::Areas(s.affected_areas(id))))
        })
    }

    /// Remove a flag from a region, returning the value it had.
    pub fn clear_flag(&self, id: &RegionId, flag: &str) -> EngineResult<Option<FlagValue>> {
        self.mutate("clear_flag", |s| {
            let old = s.table.clear_flag(id, flag)?;
            Ok((old, Invalidation::Areas(s.affected_areas(id))))
        })
    }

    /// Make `parent` an ancestor of `child`.
    pub fn link_parent(&self, child: &RegionId, parent: &RegionId) -> EngineResult<()> {
        self.mutate("link_parent", |s| {
            s.table.link_parent(child, parent)?;
            Ok(((), Invalidation::Areas(s.affected_areas(child))))
        })
    }

    pub fn unlink_parent(&self, child: &RegionId, parent: &RegionId) -> EngineResult<()> {
        self.mutate("unlink_parent", |s| {
            s.table.unlink_parent(child, parent)?;
            Ok(((), Invalidation::Areas(s.affected_areas(child))))
        })
    }

    /// Change a region's priority, returning the old one.
    pub fn set_priority(&self, id: &RegionId, priority: i32) -> EngineResult<i32> {
        self.mutate("set_priority", |s| {
            let old = s.table.set_priority(id, priority)?;
            Ok((old, Invalidation::Areas(s.affected_areas(id))))
        })
    }

    /// Add an owner (`owner == true`) or member. Returns whether it was new.
    pub fn add_member(&self, id: &RegionId, member: Member, owner: bool) -> EngineResult<bool> {
        self.mutate("add_member", |s| {
            let added = s.table.add_member(id, member, owner)?;
            Ok((added, Invalidation::Areas(s.affected_areas(id))))
        })
    }

    /// Remove an owner or member. Returns whether it was present.
    pub fn remove_member(&self, id: &RegionId, member: &Member, owner: bool) -> EngineResult<bool> {
        self.mutate("remove_member", |s| {
            let removed = s.table.remove_member(id, member, owner)?;
            Ok((removed, Invalidation::Areas(s.affected_areas(id))))
        })
    }

    /// Set a flag on the global default region.
    ///
    /// Registered flags must keep a definite global value.
    pub fn set_global_flag(
        &self,
        flag: impl Into<FlagKey>,
        value: impl Into<FlagValue>,
    ) -> EngineResult<Option<FlagValue>> {
        let flag = flag.into();
        let value = value.into();
        if self.registry.contains(flag.as_str()) && !value.state.is_definite() {
            return Err(EngineError::Misconfigured(format!(
                "registered flag {flag} needs a definite global value"
            )));
        }
        self.mutate("set_global_flag", |s| {
            Ok((s.global.insert(flag, value), Invalidation::All))
        })
    }

    /// Remove an unregistered flag from the global default region.
    pub fn clear_global_flag(&self, flag: &str) -> EngineResult<Option<FlagValue>> {
        if self.registry.contains(flag) {
            return Err(EngineError::Misconfigured(format!(
                "registered flag {flag} cannot lose its global value"
            )));
        }
        self.mutate("clear_global_flag", |s| {
            Ok((s.global.remove(flag), Invalidation::All))
        })
    }

    /// Drop cached decisions for a region and its descendants. Returns how
    /// many entries were removed.
    pub fn invalidate(&self, id: &RegionId) -> EngineResult<usize> {
        let snapshot = self.snapshot();
        if !snapshot.table.contains(id) {
            return Err(EngineError::NotFound(id.clone()));
        }
        Ok(self
            .cache
            .invalidate_boxes(&snapshot.affected_areas(id), snapshot.generation))
    }

    /// Drop every cached decision.
    pub fn invalidate_all(&self) -> usize {
        let generation = self.generation();
        self.cache.invalidate_all(generation)
    }

    /// Add a batch of regions atomically.
    ///
    /// The whole batch is validated before anything is published: ids must
    /// be new and unique, shapes valid, parents present in the engine or
    /// the batch, and the parent graph acyclic and shallow enough. On
    /// failure the engine is unchanged and the error names the first bad
    /// record. Large batches rebuild the spatial index by bulk loading.
    pub fn import(&self, records: Vec<RegionRecord>) -> EngineResult<usize> {
        let count = records.len();
        let bulk = count >= self.config.bulk_load_threshold;

        self.mutate("import", |s| {
            let ids = import::stage(records, &mut s.table, Parents::Known)?;

            let invalidation = if bulk {
                s.index = build_index(&s.table, &self.config)?;
                Invalidation::All
            } else {
                let mut areas = Vec::new();
                for id in &ids {
                    let region = s
                        .table
                        .get(id)
                        .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                    s.index
                        .insert(id.clone(), region.world().clone(), region.bounds())?;
                    areas.extend(s.affected_areas(id));
                }
                Invalidation::Areas(areas)
            };

            info!(
                imported = count,
                bulk,
                total = s.table.len(),
                generation = s.generation,
                "imported regions"
            );
            Ok((count, invalidation))
        })
    }

    /// Current regions and global flags, regions sorted by id.
    #[must_use]
    pub fn export_state(&self) -> EngineState {
        let snapshot = self.snapshot();
        let mut regions: Vec<RegionRecord> = snapshot
            .table
            .iter()
            .map(|r| RegionRecord::from(r.as_ref()))
            .collect();
        regions.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        EngineState {
            global: snapshot.global.clone(),
            regions,
        }
    }
}

/// Registered defaults overlaid with persisted global values.
fn seed_global(
    registry: &FlagRegistry,
    persisted: BTreeMap<FlagKey, FlagValue>,
) -> EngineResult<BTreeMap<FlagKey, FlagValue>> {
    let mut global: BTreeMap<FlagKey, FlagValue> = registry
        .iter()
        .map(|(key, default)| (key.clone(), FlagValue::new(default)))
        .collect();
    global.extend(persisted);

    let missing: Vec<&str> = registry
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| {
            !global
                .get(*key)
                .is_some_and(|value| value.state.is_definite())
        })
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::Misconfigured(format!(
            "registered flags without a definite global value: {}",
            missing.join(", ")
        )));
    }
    Ok(global)
}

fn build_index(table: &RegionTable, config: &EngineConfig) -> EngineResult<SpatialIndex<RegionId>> {
    Ok(SpatialIndex::bulk_load(
        table
            .iter()
            .map(|r| (r.id().clone(), r.world().clone(), r.bounds())),
        config.index,
    )?)
}
