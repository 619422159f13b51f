//! Resolution results.

use serde::Serialize;
use warden_region::{RegionId, Verdict};

/// Who settled a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DecisionSource {
    /// The covering region whose effective value won.
    Region(RegionId),
    /// The global default region.
    GlobalDefault,
    /// Nobody had a value; the configured unknown-flag verdict applied.
    Fallback,
}

/// The answer to "is this flag allowed here".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub source: DecisionSource,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.verdict.is_allowed()
    }

    /// The deciding region, if a region decided.
    #[must_use]
    pub const fn region(&self) -> Option<&RegionId> {
        match &self.source {
            DecisionSource::Region(id) => Some(id),
            DecisionSource::GlobalDefault | DecisionSource::Fallback => None,
        }
    }
}

/// Adapter-facing form of a [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub allow: bool,
    /// `None` when the global default or the fallback decided.
    pub region_id: Option<RegionId>,
}

impl From<Decision> for QueryResult {
    fn from(decision: Decision) -> Self {
        Self {
            allow: decision.is_allowed(),
            region_id: match decision.source {
                DecisionSource::Region(id) => Some(id),
                DecisionSource::GlobalDefault | DecisionSource::Fallback => None,
            },
        }
    }
}
