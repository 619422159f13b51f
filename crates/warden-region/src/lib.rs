//! Warden region model.
//!
//! Regions, their flags and members, and the table that owns them.
//!
//! # Flag lookup
//!
//! ```text
//!   region's own value ──► definite? ──► done
//!          │ Inherit / filtered out
//!          ▼
//!   parents, declaration order (missing ids skipped)
//!          │ first definite answer wins
//!          ▼
//!       Inherit  (caller falls back to the global default)
//! ```
//!
//! A value can be restricted to member groups and can exempt members;
//! both apply only when the query names a [`Subject`].

mod error;
mod flag;
mod member;
mod record;
mod region;
mod registry;
mod table;

pub use error::{RegionError, RegionResult};
pub use flag::{FlagGroups, FlagKey, FlagState, FlagValue, FlagValueDescriptor, Verdict};
pub use member::{Actor, Member, Subject};
pub use record::RegionRecord;
pub use region::{Parents, Region, RegionId};
pub use registry::{CAN_BREAK, CAN_PLACE, FlagRegistry};
pub use table::{DEFAULT_MAX_PARENT_DEPTH, RegionTable};
