//! Warden region-protection engine.
//!
//! Answers "may this action happen at this point" for named flags, given
//! a set of prioritized, nestable regions per world.
//!
//! # Architecture
//!
//! ```text
//!   query(point, flag)
//!         │
//!         ▼
//!   DecisionCache ──hit──► Decision
//!         │ miss
//!         ▼
//!   Snapshot (Arc, immutable)
//!     SpatialIndex ──► candidate ids ──► exact shape test
//!     RegionTable  ──► effective flag per region (parents followed)
//!         │
//!         ▼
//!   highest priority level with a definite value decides
//!   (ties: TieBreak), else global default, else fallback verdict
//! ```
//!
//! Mutations are serialized. Each builds the next snapshot from a copy
//! of the current one, invalidates the cache cells it affects, then
//! publishes. Readers keep whatever snapshot they loaded.
//!
//! # Example
//!
//! ```
//! use warden_engine::{Engine, EngineConfig};
//! use warden_geom::Shape;
//! use warden_region::{FlagRegistry, FlagState, Region, CAN_BREAK};
//!
//! let engine = Engine::new(EngineConfig::default(), FlagRegistry::standard()).unwrap();
//! let spawn = Shape::cuboid([-50.0, 0.0, -50.0], [50.0, 255.0, 50.0]).unwrap();
//! engine
//!     .create_region(Region::new("spawn", "overworld", spawn).with_flag(CAN_BREAK, FlagState::Deny))
//!     .unwrap();
//!
//! let answer = engine.query("overworld", 10.0, 64.0, 10.0, CAN_BREAK);
//! assert!(!answer.allow);
//! assert_eq!(answer.region_id.unwrap().as_str(), "spawn");
//! ```

mod config;
mod decision;
mod engine;
mod error;
mod import;
mod snapshot;
mod state;

pub use config::{DEFAULT_BULK_LOAD_THRESHOLD, EngineConfig, TieBreak};
pub use decision::{Decision, DecisionSource, QueryResult};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use state::EngineState;
