//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Default number of cached decisions.
pub const DEFAULT_CAPACITY: usize = 65_536;

/// Default time-to-live for a cached decision, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 10_000;

/// Default number of entries dropped per eviction pass.
pub const DEFAULT_EVICTION_BATCH: usize = 1_024;

/// Decision cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,

    /// Entry count above which least recently used entries are evicted.
    pub capacity: usize,

    /// Entries older than this are treated as absent. `0` disables expiry.
    pub ttl_ms: u64,

    /// Minimum number of entries removed once the cache is over capacity.
    pub eviction_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            ttl_ms: DEFAULT_TTL_MS,
            eviction_batch: DEFAULT_EVICTION_BATCH,
        }
    }
}

impl CacheConfig {
    /// A config with caching turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Time-to-live, or `None` if entries never expire.
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        if self.ttl_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.ttl_ms))
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.enabled && self.capacity == 0 {
            return Err(CacheError::InvalidConfig("capacity must be positive"));
        }
        if self.eviction_batch == 0 {
            return Err(CacheError::InvalidConfig("eviction_batch must be positive"));
        }
        Ok(())
    }
}
