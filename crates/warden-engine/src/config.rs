//! Engine configuration.

use serde::{Deserialize, Serialize};
use warden_cache::CacheConfig;
use warden_geom::CellGrid;
use warden_index::RTreeParams;
use warden_region::{DEFAULT_MAX_PARENT_DEPTH, Verdict};

use crate::{EngineError, EngineResult};

/// Default batch size at which imports rebuild the index with STR packing.
pub const DEFAULT_BULK_LOAD_THRESHOLD: usize = 256;

/// How equal-priority regions that disagree are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Deny beats Allow.
    #[default]
    DenyWins,
    /// Allow beats Deny.
    AllowWins,
}

impl TieBreak {
    #[must_use]
    pub const fn winner(self) -> Verdict {
        match self {
            Self::DenyWins => Verdict::Deny,
            Self::AllowWins => Verdict::Allow,
        }
    }
}

/// Engine settings. Every field has a default, so a partial JSON object
/// is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge length of a cache cell in blocks.
    pub cell_size: f64,

    /// Longest allowed ancestor chain, in parent links.
    pub max_parent_depth: usize,

    pub tie_break: TieBreak,

    /// Answer for flags nobody has a definite value for: not registered,
    /// not set globally, and not set on any covering region.
    pub unknown_flag_verdict: Verdict,

    /// Imports at least this large rebuild the spatial index from scratch.
    pub bulk_load_threshold: usize,

    pub index: RTreeParams,

    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
            tie_break: TieBreak::default(),
            unknown_flag_verdict: Verdict::Deny,
            bulk_load_threshold: DEFAULT_BULK_LOAD_THRESHOLD,
            index: RTreeParams::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if CellGrid::new(self.cell_size).is_none() {
            return Err(EngineError::Misconfigured(format!(
                "cell_size must be finite and positive, got {}",
                self.cell_size
            )));
        }
        if self.max_parent_depth == 0 {
            return Err(EngineError::Misconfigured(
                "max_parent_depth must be at least 1".to_owned(),
            ));
        }
        self.index
            .validate()
            .map_err(|e| EngineError::Misconfigured(e.to_string()))?;
        self.cache
            .validate()
            .map_err(|e| EngineError::Misconfigured(e.to_string()))?;
        Ok(())
    }

    /// Cell grid for `cell_size`, falling back to block cells if invalid.
    #[must_use]
    pub fn grid(&self) -> CellGrid {
        CellGrid::new(self.cell_size).unwrap_or_default()
    }
}
