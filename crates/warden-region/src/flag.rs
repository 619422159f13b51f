//! Flag keys and values.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Member, Subject};

/// Name of a permission flag, e.g. `can_break`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagKey(Arc<str>);

impl FlagKey {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FlagKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlagKey({})", self.0)
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlagKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for FlagKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Tri-state flag setting. `Inherit` defers to parents, then to the
/// global default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    Allow,
    Deny,
    #[default]
    Inherit,
}

impl FlagState {
    /// The verdict this state settles on, or `None` for `Inherit`.
    #[must_use]
    pub const fn verdict(self) -> Option<Verdict> {
        match self {
            Self::Allow => Some(Verdict::Allow),
            Self::Deny => Some(Verdict::Deny),
            Self::Inherit => None,
        }
    }

    #[must_use]
    pub const fn is_definite(self) -> bool {
        !matches!(self, Self::Inherit)
    }
}

/// A definite answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<Verdict> for FlagState {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allow => Self::Allow,
            Verdict::Deny => Self::Deny,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

bitflags! {
    /// Which subjects a flag value applies to, relative to the region that
    /// holds it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FlagGroups: u8 {
        /// Owners and members of the region.
        const MEMBER = 1 << 0;
        /// Everyone else.
        const NONMEMBER = 1 << 1;
    }
}

impl Default for FlagGroups {
    fn default() -> Self {
        Self::all()
    }
}

/// A flag setting on one region.
///
/// Beyond the plain state, a value can be narrowed to member groups and
/// can exempt specific members. Both only take effect when the query names
/// a subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagValue {
    pub state: FlagState,
    #[serde(default, skip_serializing_if = "FlagGroups::is_all")]
    pub groups: FlagGroups,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub exemptions: SmallVec<[Member; 2]>,
}

/// Wire form of a [`FlagValue`] in records and persisted state.
pub type FlagValueDescriptor = FlagValue;

impl From<FlagState> for FlagValue {
    fn from(state: FlagState) -> Self {
        Self::new(state)
    }
}

impl FlagValue {
    #[must_use]
    pub fn new(state: FlagState) -> Self {
        Self {
            state,
            groups: FlagGroups::all(),
            exemptions: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn allow() -> Self {
        Self::new(FlagState::Allow)
    }

    #[must_use]
    pub fn deny() -> Self {
        Self::new(FlagState::Deny)
    }

    #[must_use]
    pub fn inherit() -> Self {
        Self::new(FlagState::Inherit)
    }

    /// Restrict the value to the given groups.
    #[must_use]
    pub const fn with_groups(mut self, groups: FlagGroups) -> Self {
        self.groups = groups;
        self
    }

    /// Always allow `member`, whatever the state says.
    #[must_use]
    pub fn with_exemption(mut self, member: Member) -> Self {
        if !self.exemptions.contains(&member) {
            self.exemptions.push(member);
        }
        self
    }

    /// The state this value contributes for a query.
    ///
    /// Without a subject this is just `state`. With one, exempt subjects get
    /// `Allow`, and subjects outside `groups` get `Inherit` so the lookup
    /// continues past this value. `is_member` tells whether the subject
    /// belongs to the region holding the value.
    pub fn evaluate(
        &self,
        subject: Option<&dyn Subject>,
        is_member: impl FnOnce(&dyn Subject) -> bool,
    ) -> FlagState {
        let Some(subject) = subject else {
            return self.state;
        };

        if self.exemptions.iter().any(|m| m.matches(subject)) {
            return FlagState::Allow;
        }

        if !self.groups.is_all() {
            let group = if is_member(subject) {
                FlagGroups::MEMBER
            } else {
                FlagGroups::NONMEMBER
            };
            if !self.groups.contains(group) {
                return FlagState::Inherit;
            }
        }

        self.state
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::Actor;

    #[test]
    fn test_no_subject_ignores_payload() {
        let uuid = Uuid::new_v4();
        let value = FlagValue::deny()
            .with_groups(FlagGroups::NONMEMBER)
            .with_exemption(Member::Player(uuid));

        assert_eq!(value.evaluate(None, |_| true), FlagState::Deny);
    }

    #[test]
    fn test_exemption_allows() {
        let uuid = Uuid::new_v4();
        let value = FlagValue::deny().with_exemption(Member::Player(uuid));

        let exempt = Actor::new(uuid);
        let other = Actor::new(Uuid::new_v4());
        assert_eq!(value.evaluate(Some(&exempt), |_| false), FlagState::Allow);
        assert_eq!(value.evaluate(Some(&other), |_| false), FlagState::Deny);
    }

    #[test]
    fn test_groups_filter_subjects() {
        let value = FlagValue::deny().with_groups(FlagGroups::NONMEMBER);
        let actor = Actor::new(Uuid::new_v4());

        assert_eq!(value.evaluate(Some(&actor), |_| false), FlagState::Deny);
        assert_eq!(value.evaluate(Some(&actor), |_| true), FlagState::Inherit);
    }

    #[test]
    fn test_plain_value_json_is_compact() {
        let json = serde_json::to_string(&FlagValue::allow()).unwrap();
        assert_eq!(json, r#"{"state":"allow"}"#);

        let back: FlagValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FlagValue::allow());
    }

    #[test]
    fn test_grouped_value_round_trips() {
        let value = FlagValue::deny()
            .with_groups(FlagGroups::MEMBER)
            .with_exemption(Member::Permission("warden.bypass".to_owned()));
        let json = serde_json::to_string(&value).unwrap();
        let back: FlagValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_flag_key_borrows_as_str() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(FlagKey::new("can_break"), 1);
        assert_eq!(map.get("can_break"), Some(&1));
    }
}
