//! Registry of known flags and their defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FlagKey, FlagState};

/// Breaking blocks. Denied unless a region allows it.
pub const CAN_BREAK: &str = "can_break";

/// Placing blocks. Allowed unless a region denies it.
pub const CAN_PLACE: &str = "can_place";

/// The flags an engine will be asked about, each with the state the global
/// default region starts with.
///
/// A registered flag whose default is `Inherit` must be given a definite
/// global value before the engine will start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagRegistry {
    defaults: BTreeMap<FlagKey, FlagState>,
}

impl FlagRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in flags.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with(CAN_BREAK, FlagState::Deny)
            .with(CAN_PLACE, FlagState::Allow)
    }

    /// Register a flag, returning the previous default if it was known.
    pub fn register(&mut self, key: impl Into<FlagKey>, default: FlagState) -> Option<FlagState> {
        self.defaults.insert(key.into(), default)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<FlagKey>, default: FlagState) -> Self {
        self.register(key, default);
        self
    }

    #[must_use]
    pub fn default_for(&self, key: &str) -> Option<FlagState> {
        self.defaults.get(key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.defaults.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlagKey, FlagState)> {
        self.defaults.iter().map(|(k, v)| (k, *v))
    }
}
