//! Serializable region records used for ingestion and persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_geom::{Shape, ShapeDescriptor, ShapeError, WorldId};

use crate::{FlagKey, FlagValueDescriptor, Member, Region, RegionId};

/// Everything needed to rebuild a [`Region`].
///
/// Importers for foreign region formats produce batches of these; the
/// persisted engine state is a list of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: RegionId,
    pub world: WorldId,
    pub shape: ShapeDescriptor,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<FlagKey, FlagValueDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<RegionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Member>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
}

impl RegionRecord {
    /// A record with priority 0 and nothing else attached.
    #[must_use]
    pub fn new(id: impl Into<RegionId>, world: impl Into<WorldId>, shape: ShapeDescriptor) -> Self {
        Self {
            id: id.into(),
            world: world.into(),
            shape,
            priority: 0,
            flags: BTreeMap::new(),
            parents: Vec::new(),
            owners: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Build the region, validating the shape.
    ///
    /// Repeated parent ids collapse onto their first occurrence.
    pub fn into_region(self) -> Result<Region, ShapeError> {
        let shape = Shape::try_from(self.shape)?;
        let mut region = Region::new(self.id, self.world, shape).with_priority(self.priority);
        for (key, value) in self.flags {
            region = region.with_flag(key, value);
        }
        for parent in self.parents {
            region = region.with_parent(parent);
        }
        for owner in self.owners {
            region = region.with_owner(owner);
        }
        for member in self.members {
            region = region.with_member(member);
        }
        Ok(region)
    }
}

impl From<&Region> for RegionRecord {
    fn from(region: &Region) -> Self {
        Self {
            id: region.id().clone(),
            world: region.world().clone(),
            shape: ShapeDescriptor::from(region.shape()),
            priority: region.priority(),
            flags: region.flags().clone(),
            parents: region.parents().to_vec(),
            owners: region.owners().iter().cloned().collect(),
            members: region.members().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::FlagValue;

    fn record() -> RegionRecord {
        let mut record = RegionRecord::new(
            "market",
            "overworld",
            ShapeDescriptor::Polygon {
                vertices: vec![[0.0, 0.0], [10.5, 0.0], [10.5, 7.25], [0.0, 7.25]],
                y_min: -64.0,
                y_max: 320.0,
            },
        );
        record.priority = 3;
        record.flags.insert(FlagKey::new("can_break"), FlagValue::deny());
        record.parents = vec![RegionId::new("town")];
        record.owners = vec![Member::Player(Uuid::from_u128(7))];
        record.members = vec![Member::Permission("town.resident".to_owned())];
        record
    }

    #[test]
    fn test_record_region_round_trip() {
        let original = record();
        let region = original.clone().into_region().unwrap();
        assert_eq!(region.priority(), 3);
        assert_eq!(region.parents(), [RegionId::new("town")]);

        assert_eq!(RegionRecord::from(&region), original);
    }

    #[test]
    fn test_record_json_round_trip() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let back: RegionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_minimal_record_json() {
        let json = r#"{"id":"a","world":"w","shape":{"kind":"sphere","center":[0.0,64.0,0.0],"radius":8.0}}"#;
        let record: RegionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.priority, 0);
        assert!(record.flags.is_empty());
        assert!(record.into_region().is_ok());
    }

    #[test]
    fn test_bad_shape_is_rejected() {
        let record = RegionRecord::new(
            "bad",
            "w",
            ShapeDescriptor::Sphere {
                center: [0.0; 3],
                radius: -1.0,
            },
        );
        assert_eq!(
            record.into_region(),
            Err(ShapeError::NonPositiveRadius(-1.0))
        );
    }
}
