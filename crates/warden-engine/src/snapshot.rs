//! Immutable engine state served to readers.

use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::SmallVec;
use warden_geom::{Aabb, Coverage, Point, WorldId};
use warden_index::SpatialIndex;
use warden_region::{FlagKey, FlagValue, Region, RegionId, RegionTable, Subject, Verdict};

use crate::{Decision, DecisionSource, TieBreak};

/// One consistent version of the region set.
///
/// Readers hold an `Arc<Snapshot>` and never see it change. Writers clone
/// the current snapshot, mutate the clone and publish it as the next
/// generation; the table and index clones share all untouched data.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub table: RegionTable,
    pub index: SpatialIndex<RegionId>,
    /// Flag table of the global default region. It covers every point in
    /// every world at the lowest priority and is never indexed.
    pub global: BTreeMap<FlagKey, FlagValue>,
}

impl Snapshot {
    /// Regions whose shape contains `point`, highest priority first, ties
    /// ordered by id.
    pub fn covering(&self, point: &Point) -> SmallVec<[&Arc<Region>; 8]> {
        let mut out: SmallVec<[&Arc<Region>; 8]> = SmallVec::new();
        self.index.for_each_at(point, |id| {
            if let Some(region) = self.table.get(id) {
                if region.contains(point) {
                    out.push(region);
                }
            }
        });
        out.sort_unstable_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id().cmp(b.id()))
        });
        out
    }

    /// Resolve `key` at `point`.
    ///
    /// Walks the covering regions one priority level at a time, highest
    /// first. The first level where some region has a definite effective
    /// value decides; if its regions disagree, `tie_break` picks the
    /// verdict and the lowest id holding that verdict is the decider.
    /// Without any definite region value the global default decides, as it
    /// does for points with a non-finite coordinate.
    /// `None` means nobody has a value for `key`.
    pub fn resolve(
        &self,
        point: &Point,
        key: &str,
        subject: Option<&dyn Subject>,
        tie_break: TieBreak,
    ) -> Option<Decision> {
        if !point.is_finite() {
            return self.global_decision(key, subject);
        }

        let covering = self.covering(point);
        let mut rest = covering.as_slice();

        while let Some(first) = rest.first() {
            let priority = first.priority();
            let level_len = rest
                .iter()
                .position(|r| r.priority() != priority)
                .unwrap_or(rest.len());
            let (level, tail) = rest.split_at(level_len);
            rest = tail;

            let mut allow: Option<&RegionId> = None;
            let mut deny: Option<&RegionId> = None;
            for region in level {
                match self.table.effective_flag_of(region, key, subject).verdict() {
                    Some(Verdict::Allow) => {
                        allow.get_or_insert(region.id());
                    }
                    Some(Verdict::Deny) => {
                        deny.get_or_insert(region.id());
                    }
                    None => {}
                }
            }

            let (verdict, id) = match (allow, deny) {
                (None, None) => continue,
                (Some(id), None) => (Verdict::Allow, id),
                (None, Some(id)) => (Verdict::Deny, id),
                (Some(allow), Some(deny)) => match tie_break.winner() {
                    Verdict::Allow => (Verdict::Allow, allow),
                    Verdict::Deny => (Verdict::Deny, deny),
                },
            };
            return Some(Decision {
                verdict,
                source: DecisionSource::Region(id.clone()),
            });
        }

        self.global_decision(key, subject)
    }

    fn global_decision(&self, key: &str, subject: Option<&dyn Subject>) -> Option<Decision> {
        self.global_verdict(key, subject).map(|verdict| Decision {
            verdict,
            source: DecisionSource::GlobalDefault,
        })
    }

    /// The global default's verdict for `key`.
    ///
    /// Nobody is a member of the global region. If group filtering leaves
    /// the value without an answer for the subject, its plain state is used.
    fn global_verdict(&self, key: &str, subject: Option<&dyn Subject>) -> Option<Verdict> {
        let value = self.global.get(key)?;
        value
            .evaluate(subject, |_| false)
            .verdict()
            .or_else(|| value.state.verdict())
    }

    /// Whether every point of `area` in `world` is covered by the same
    /// regions, so that one anonymous answer holds for all of them.
    ///
    /// Conservative: shapes that only partly cover `area`, or that the
    /// coverage test cannot settle, make it `false`.
    pub fn is_uniform(&self, world: &WorldId, area: &Aabb) -> bool {
        let mut uniform = true;
        self.index.for_each_in(world, area, |id| {
            if uniform {
                uniform = self
                    .table
                    .get(id)
                    .is_none_or(|r| r.shape().coverage(area) != Coverage::Partial);
            }
        });
        uniform
    }

    /// Boxes whose cached decisions may change when region `id` changes:
    /// its own box and those of every existing descendant.
    pub fn affected_areas(&self, id: &RegionId) -> Vec<(WorldId, Aabb)> {
        std::iter::once(id.clone())
            .chain(self.table.descendants(id))
            .filter_map(|rid| {
                self.table
                    .get(&rid)
                    .map(|r| (r.world().clone(), r.bounds()))
            })
            .collect()
    }

    /// Check that the index holds exactly the table's regions under their
    /// current boxes, and that the R-trees are well formed.
    pub fn check_consistency(&self) -> Result<(), String> {
        self.index.check_invariants()?;
        if self.index.len() != self.table.len() {
            return Err(format!(
                "index holds {} regions, table holds {}",
                self.index.len(),
                self.table.len()
            ));
        }
        for region in self.table.iter() {
            match self.index.bounds_of(region.id()) {
                Some((world, bounds)) if world == region.world() && *bounds == region.bounds() => {}
                other => {
                    return Err(format!(
                        "region {} indexed as {other:?}, expected {} {:?}",
                        region.id(),
                        region.world(),
                        region.bounds()
                    ));
                }
            }
        }
        Ok(())
    }
}
