//! The decision cache.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};
use warden_geom::{Aabb, Cell, CellGrid, WorldId};
use warden_region::FlagKey;

use crate::stats::Counters;
use crate::{CacheConfig, CacheStats};

/// What a cached decision is keyed by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub cell: Cell,
    pub flag: FlagKey,
}

impl CacheKey {
    #[must_use]
    pub const fn new(cell: Cell, flag: FlagKey) -> Self {
        Self { cell, flag }
    }
}

struct Slot<V> {
    value: V,
    inserted: Instant,
    /// Logical access time, for LRU ordering.
    last_used: AtomicU64,
}

/// Concurrent cache of resolution results keyed by (cell, flag).
///
/// Every entry belongs to one snapshot generation: `put` only accepts
/// values computed from the generation the cache is currently at, and the
/// invalidation calls advance that generation under the same write lock
/// that removes affected entries. A reader that resolved against an old
/// snapshot can therefore never store its answer after a mutation has
/// invalidated the cell.
pub struct DecisionCache<V> {
    entries: DashMap<CacheKey, Slot<V>>,
    config: CacheConfig,
    grid: CellGrid,
    generation: RwLock<u64>,
    clock: AtomicU64,
    evicting: AtomicBool,
    counters: Counters,
}

impl<V: Clone> DecisionCache<V> {
    /// Create an empty cache at generation 0.
    #[must_use]
    pub fn new(config: CacheConfig, grid: CellGrid) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            grid,
            generation: RwLock::new(0),
            clock: AtomicU64::new(0),
            evicting: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub const fn grid(&self) -> &CellGrid {
        &self.grid
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generation puts must currently carry.
    #[must_use]
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len(), self.generation())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn is_expired(&self, slot: &Slot<V>) -> bool {
        self.config
            .ttl()
            .is_some_and(|ttl| slot.inserted.elapsed() >= ttl)
    }

    /// Look up a decision. Expired entries are removed and count as misses.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let lookup = self.entries.get(key).map(|slot| {
            if self.is_expired(&slot) {
                None
            } else {
                slot.last_used.store(self.tick(), Ordering::Relaxed);
                Some(slot.value.clone())
            }
        });

        match lookup {
            Some(Some(value)) => {
                Counters::bump(&self.counters.hits, 1);
                trace!(
                    world = %key.cell.world,
                    x = key.cell.x,
                    y = key.cell.y,
                    z = key.cell.z,
                    flag = %key.flag,
                    "decision cache hit"
                );
                Some(value)
            }
            Some(None) => {
                if self
                    .entries
                    .remove_if(key, |_, slot| self.is_expired(slot))
                    .is_some()
                {
                    Counters::bump(&self.counters.expirations, 1);
                }
                Counters::bump(&self.counters.misses, 1);
                None
            }
            None => {
                Counters::bump(&self.counters.misses, 1);
                None
            }
        }
    }

    /// Store a decision computed from snapshot `generation`.
    ///
    /// Returns `false` if the cache is disabled or the generation is not
    /// the current one, in which case nothing is stored.
    pub fn put(&self, key: CacheKey, value: V, generation: u64) -> bool {
        if !self.config.enabled {
            return false;
        }

        {
            let current = self.generation.read();
            if generation != *current {
                Counters::bump(&self.counters.stale_puts, 1);
                return false;
            }
            let slot = Slot {
                value,
                inserted: Instant::now(),
                last_used: AtomicU64::new(self.tick()),
            };
            self.entries.insert(key, slot);
        }
        Counters::bump(&self.counters.inserts, 1);

        if self.entries.len() > self.config.capacity {
            self.evict();
        }
        true
    }

    /// Advance to `generation` and drop every entry whose cell overlaps
    /// `bounds` in `world`. Returns how many entries were removed.
    pub fn invalidate_box(&self, world: &WorldId, bounds: &Aabb, generation: u64) -> usize {
        self.invalidate_boxes(&[(world.clone(), *bounds)], generation)
    }

    /// Advance to `generation` and drop every entry whose cell overlaps
    /// any of `areas`, in one pass.
    pub fn invalidate_boxes(&self, areas: &[(WorldId, Aabb)], generation: u64) -> usize {
        let mut current = self.generation.write();
        *current = (*current).max(generation);

        let mut removed = 0;
        if !areas.is_empty() {
            self.entries.retain(|key, _| {
                let hit = areas.iter().any(|(world, bounds)| {
                    key.cell.world == *world && self.grid.touches(&key.cell, bounds)
                });
                if hit {
                    removed += 1;
                }
                !hit
            });
        }
        drop(current);

        Counters::bump(&self.counters.invalidated, removed as u64);
        debug!(removed, areas = areas.len(), generation, "invalidated cached decisions");
        removed
    }

    /// Advance to `generation` and drop everything.
    pub fn invalidate_all(&self, generation: u64) -> usize {
        let mut current = self.generation.write();
        *current = (*current).max(generation);
        let removed = self.entries.len();
        self.entries.clear();
        drop(current);

        Counters::bump(&self.counters.invalidated, removed as u64);
        debug!(removed, generation, "invalidated all cached decisions");
        removed
    }

    /// Drop every entry without changing the generation.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries, then the least recently used ones until the
    /// cache is back at capacity. At least `eviction_batch` entries go per
    /// pass so a full cache does not evict on every put.
    fn evict(&self) {
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let mut expired = 0u64;
        if self.config.ttl().is_some() {
            self.entries.retain(|_, slot| {
                let keep = !self.is_expired(slot);
                if !keep {
                    expired += 1;
                }
                keep
            });
        }

        let len = self.entries.len();
        let mut evicted = 0u64;
        if len > self.config.capacity {
            let target = (len - self.config.capacity)
                .max(self.config.eviction_batch)
                .min(len);

            let mut ages: Vec<(u64, CacheKey)> = self
                .entries
                .iter()
                .map(|entry| {
                    (
                        entry.value().last_used.load(Ordering::Relaxed),
                        entry.key().clone(),
                    )
                })
                .collect();
            if target < ages.len() {
                ages.select_nth_unstable_by_key(target, |(tick, _)| *tick);
                ages.truncate(target);
            }
            for (_, key) in ages {
                if self.entries.remove(&key).is_some() {
                    evicted += 1;
                }
            }
        }

        Counters::bump(&self.counters.expirations, expired);
        Counters::bump(&self.counters.evictions, evicted);
        debug!(evicted, expired, len = self.entries.len(), "decision cache eviction pass");

        self.evicting.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn key(world: &str, x: i64, flag: &str) -> CacheKey {
        CacheKey::new(
            Cell {
                world: WorldId::new(world),
                x,
                y: 64,
                z: 0,
            },
            FlagKey::new(flag),
        )
    }

    fn cache(config: CacheConfig) -> DecisionCache<u32> {
        DecisionCache::new(config, CellGrid::BLOCK)
    }

    #[test]
    fn test_put_then_get() {
        let cache = cache(CacheConfig::default());
        assert_eq!(cache.get(&key("w", 1, "f")), None);
        assert!(cache.put(key("w", 1, "f"), 7, 0));

        assert_eq!(cache.get(&key("w", 1, "f")), Some(7));
        assert_eq!(cache.get(&key("w", 1, "g")), None);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 2, 1));
        assert_eq!(stats.len, 1);
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let cache = cache(CacheConfig::default());
        cache.invalidate_all(3);

        assert!(!cache.put(key("w", 1, "f"), 1, 2));
        assert_eq!(cache.get(&key("w", 1, "f")), None);
        assert!(cache.put(key("w", 1, "f"), 1, 3));
        assert_eq!(cache.stats().stale_puts, 1);
    }

    #[test]
    fn test_generation_never_moves_backwards() {
        let cache = cache(CacheConfig::default());
        cache.invalidate_all(5);
        cache.invalidate_box(&WorldId::new("w"), &Aabb::point([0.0; 3]), 4);
        assert_eq!(cache.generation(), 5);
    }

    #[test]
    fn test_invalidate_box_is_world_and_box_scoped() {
        let cache = cache(CacheConfig::default());
        for x in 0..10 {
            cache.put(key("w", x, "f"), 0, 0);
        }
        cache.put(key("other", 3, "f"), 0, 0);

        let bounds = Aabb::new([2.5, 0.0, 0.0], [4.5, 100.0, 0.0]);
        let removed = cache.invalidate_box(&WorldId::new("w"), &bounds, 1);

        assert_eq!(removed, 3);
        assert_eq!(cache.generation(), 1);
        assert!(cache.get(&key("w", 1, "f")).is_some());
        assert!(cache.get(&key("w", 3, "f")).is_none());
        assert!(cache.get(&key("w", 5, "f")).is_some());
        assert!(cache.get(&key("other", 3, "f")).is_some());
    }

    #[test]
    fn test_invalidate_boxes_single_pass() {
        let cache = cache(CacheConfig::default());
        for x in 0..10 {
            cache.put(key("w", x, "f"), 0, 0);
        }
        let areas = [
            (WorldId::new("w"), Aabb::new([0.2, 0.0, 0.0], [1.0, 100.0, 0.0])),
            (WorldId::new("w"), Aabb::new([8.2, 0.0, 0.0], [9.0, 100.0, 0.0])),
        ];
        assert_eq!(cache.invalidate_boxes(&areas, 1), 4);
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn test_invalidate_box_smaller_than_a_cell() {
        let cache = DecisionCache::new(CacheConfig::default(), CellGrid::new(16.0).unwrap());
        let cell = |x: i64| {
            let cell = Cell {
                world: WorldId::new("w"),
                x,
                y: 4,
                z: 0,
            };
            CacheKey::new(cell, FlagKey::new("f"))
        };
        cache.put(cell(0), 1, 0);
        cache.put(cell(1), 1, 0);

        // Nowhere near either cell origin, but inside cell 0.
        let plot = Aabb::new([4.0, 68.0, 4.0], [10.0, 70.0, 10.0]);
        assert_eq!(cache.invalidate_box(&WorldId::new("w"), &plot, 1), 1);
        assert_eq!(cache.get(&cell(0)), None);
        assert_eq!(cache.get(&cell(1)), Some(1));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = cache(CacheConfig {
            ttl_ms: 1,
            ..CacheConfig::default()
        });
        cache.put(key("w", 0, "f"), 1, 0);
        thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get(&key("w", 0, "f")), None);
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_keeps_recently_used() {
        let cache = cache(CacheConfig {
            capacity: 4,
            eviction_batch: 1,
            ..CacheConfig::default()
        });
        for x in 0..4 {
            cache.put(key("w", x, "f"), 0, 0);
        }
        assert!(cache.get(&key("w", 0, "f")).is_some());
        cache.put(key("w", 4, "f"), 0, 0);

        assert_eq!(cache.len(), 4);
        assert!(cache.get(&key("w", 0, "f")).is_some());
        assert!(cache.get(&key("w", 1, "f")).is_none());
        assert!(cache.get(&key("w", 4, "f")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_batch() {
        let cache = cache(CacheConfig {
            capacity: 100,
            eviction_batch: 50,
            ..CacheConfig::default()
        });
        for x in 0..101 {
            cache.put(key("w", x, "f"), 0, 0);
        }
        assert_eq!(cache.len(), 51);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = cache(CacheConfig::disabled());
        assert!(!cache.put(key("w", 0, "f"), 1, 0));
        assert_eq!(cache.get(&key("w", 0, "f")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_put_and_invalidate() {
        let cache = cache(CacheConfig {
            capacity: 256,
            eviction_batch: 32,
            ..CacheConfig::default()
        });

        thread::scope(|s| {
            for t in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..2_000 {
                        let k = key("w", (i * 7 + t) % 500, "f");
                        if cache.get(&k).is_none() {
                            cache.put(k, 1, cache.generation());
                        }
                    }
                });
            }
            s.spawn(|| {
                for g in 1..=50 {
                    cache.invalidate_box(
                        &WorldId::new("w"),
                        &Aabb::new([0.0, 0.0, 0.0], [250.0, 100.0, 0.0]),
                        g,
                    );
                }
            });
        });

        cache.invalidate_all(51);
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 51);
    }
}
