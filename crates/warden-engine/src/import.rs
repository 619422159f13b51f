//! Staging region records into a table.

use hashbrown::HashSet;
use warden_region::{RegionId, RegionRecord, RegionTable};

use crate::{EngineError, EngineResult};

/// How parent ids that name no region are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parents {
    /// Every parent must exist already or arrive in the same batch.
    Known,
    /// Unknown parents are kept as dangling links. Used when loading
    /// persisted state, where a parent may have been deleted earlier.
    MayDangle,
}

fn rejected(index: usize, id: &RegionId, reason: EngineError) -> EngineError {
    EngineError::ImportValidationFailed {
        index,
        id: id.clone(),
        reason: Box::new(reason),
    }
}

/// Validate `records` and insert them into `table` in order.
///
/// Checks run batch-wide before anything is inserted: duplicate ids
/// (within the batch or against `table`), then shapes, then parents.
/// Cycle and depth checks happen as each record is inserted. On error
/// `table` may hold part of the batch, so callers stage into a copy.
pub fn stage(
    records: Vec<RegionRecord>,
    table: &mut RegionTable,
    parents: Parents,
) -> EngineResult<Vec<RegionId>> {
    let mut seen: HashSet<RegionId> = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if table.contains(&record.id) || !seen.insert(record.id.clone()) {
            return Err(rejected(
                index,
                &record.id,
                EngineError::DuplicateId(record.id.clone()),
            ));
        }
    }

    let mut regions = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let id = record.id.clone();
        let region = record
            .into_region()
            .map_err(|e| rejected(index, &id, e.into()))?;
        regions.push(region);
    }

    if parents == Parents::Known {
        for (index, region) in regions.iter().enumerate() {
            if let Some(missing) = region
                .parents()
                .iter()
                .find(|p| !table.contains(p) && !seen.contains(*p))
            {
                return Err(rejected(
                    index,
                    region.id(),
                    EngineError::NotFound(missing.clone()),
                ));
            }
        }
    }

    let mut ids = Vec::with_capacity(regions.len());
    for (index, region) in regions.into_iter().enumerate() {
        let id = region.id().clone();
        table
            .insert(region)
            .map_err(|e| rejected(index, &id, e.into()))?;
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use warden_geom::ShapeDescriptor;

    use super::*;
    use crate::ErrorKind;

    fn record(id: &str, parents: &[&str]) -> RegionRecord {
        let mut record = RegionRecord::new(
            id,
            "w",
            ShapeDescriptor::Cuboid {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
        );
        record.parents = parents.iter().map(RegionId::new).collect();
        record
    }

    fn reason(err: EngineError) -> (usize, ErrorKind) {
        match err {
            EngineError::ImportValidationFailed { index, reason, .. } => (index, reason.kind()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_forward_parent_reference() {
        let mut table = RegionTable::default();
        let ids = stage(
            vec![record("child", &["parent"]), record("parent", &[])],
            &mut table,
            Parents::Known,
        )
        .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(
            table.ancestors(&RegionId::new("child")),
            vec![RegionId::new("parent")]
        );
    }

    #[test]
    fn test_duplicate_in_batch() {
        let mut table = RegionTable::default();
        let err = stage(
            vec![record("a", &[]), record("b", &[]), record("a", &[])],
            &mut table,
            Parents::Known,
        )
        .unwrap_err();
        assert_eq!(reason(err), (2, ErrorKind::DuplicateId));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unknown_parent() {
        let mut table = RegionTable::default();
        let err = stage(vec![record("a", &["ghost"])], &mut table, Parents::Known).unwrap_err();
        assert_eq!(reason(err), (0, ErrorKind::NotFound));

        stage(vec![record("a", &["ghost"])], &mut table, Parents::MayDangle).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_bad_shape_and_cycle() {
        let mut table = RegionTable::default();
        let mut bad = record("bad", &[]);
        bad.shape = ShapeDescriptor::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: -1.0,
        };
        let err = stage(vec![record("ok", &[]), bad], &mut table, Parents::Known).unwrap_err();
        assert_eq!(reason(err), (1, ErrorKind::InvalidShape));

        let mut table = RegionTable::default();
        let err = stage(
            vec![record("a", &["b"]), record("b", &["a"])],
            &mut table,
            Parents::Known,
        )
        .unwrap_err();
        assert_eq!(reason(err), (1, ErrorKind::Cycle));
    }
}
