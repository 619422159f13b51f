//! Persisted engine state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_region::{FlagKey, FlagValueDescriptor, RegionRecord};

/// Everything needed to rebuild an engine: the global default flags and
/// every region.
///
/// Where and how this is stored is up to the caller; the JSON helpers are
/// a convenience. `f64` fields survive a JSON round trip exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub global: BTreeMap<FlagKey, FlagValueDescriptor>,
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
}

impl EngineState {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use warden_geom::ShapeDescriptor;
    use warden_region::FlagValue;

    use super::*;

    #[test]
    fn test_json_round_trip_is_exact() {
        let mut state = EngineState::default();
        state
            .global
            .insert(FlagKey::new("can_break"), FlagValue::deny());
        state.regions.push(RegionRecord::new(
            "odd",
            "overworld",
            ShapeDescriptor::Sphere {
                center: [0.1 + 0.2, -1e-300, 123_456.789_012_345_67],
                radius: std::f64::consts::PI,
            },
        ));

        let json = state.to_json().unwrap();
        let back = EngineState::from_json(&json).unwrap();
        assert_eq!(back, state);
        if let ShapeDescriptor::Sphere { center, radius } = &back.regions[0].shape {
            assert_eq!(center[0].to_bits(), (0.1f64 + 0.2).to_bits());
            assert_eq!(radius.to_bits(), std::f64::consts::PI.to_bits());
        }
    }

    #[test]
    fn test_empty_object_is_empty_state() {
        assert_eq!(EngineState::from_json("{}").unwrap(), EngineState::default());
    }
}
