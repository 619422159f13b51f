//! Warden decision cache.
//!
//! Memoizes resolution results per (cell, flag) so the same block is not
//! resolved again on every event.
//!
//! # Consistency
//!
//! ```text
//!   writer                              reader
//!   ──────                              ──────
//!   build snapshot g+1                  load snapshot g
//!   invalidate_box(.., g+1) ─┐          resolve
//!     write-locks generation │          put(.., g)  ──► dropped (g != g+1)
//!     removes affected cells │
//!   publish snapshot g+1   ◄─┘
//! ```
//!
//! Invalidation always happens before the new snapshot becomes visible, and
//! puts carrying an older generation are refused, so a cached answer never
//! outlives the state it was computed from.
//!
//! Beyond invalidation, entries expire after a TTL and the least recently
//! used are evicted in batches once the cache exceeds its capacity.

mod cache;
mod config;
mod error;
mod stats;

pub use cache::{CacheKey, DecisionCache};
pub use config::{CacheConfig, DEFAULT_CAPACITY, DEFAULT_EVICTION_BATCH, DEFAULT_TTL_MS};
pub use error::CacheError;
pub use stats::CacheStats;
