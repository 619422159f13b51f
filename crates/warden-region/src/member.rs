//! Region members and the subjects they match.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity attached to a region, either a specific player or anyone
/// holding a permission node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Member {
    Player(Uuid),
    Permission(String),
}

impl Member {
    /// Whether `subject` is this member.
    #[must_use]
    pub fn matches(&self, subject: &dyn Subject) -> bool {
        match self {
            Self::Player(uuid) => subject.uuid() == *uuid,
            Self::Permission(node) => subject.has_permission(node),
        }
    }
}

/// The actor a query is made on behalf of.
///
/// Platform adapters implement this over their own player type. Queries
/// without a subject (block physics, entity spawns) skip every
/// membership-dependent rule.
pub trait Subject {
    fn uuid(&self) -> Uuid;

    fn has_permission(&self, permission: &str) -> bool;
}

/// A subject with a fixed permission set, for tools and tests.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    pub uuid: Uuid,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Actor {
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            permissions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }
}

impl Subject for Actor {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_member_matches_uuid() {
        let uuid = Uuid::new_v4();
        let member = Member::Player(uuid);

        assert!(member.matches(&Actor::new(uuid)));
        assert!(!member.matches(&Actor::new(Uuid::new_v4())));
    }

    #[test]
    fn test_permission_member_matches_node() {
        let member = Member::Permission("warden.build".to_owned());
        let builder = Actor::new(Uuid::new_v4()).with_permission("warden.build");

        assert!(member.matches(&builder));
        assert!(!member.matches(&Actor::new(Uuid::new_v4())));
    }

    #[test]
    fn test_member_json_layout() {
        let member = Member::Permission("warden.admin".to_owned());
        let json = serde_json::to_string(&member).unwrap();
        assert_eq!(json, r#"{"type":"permission","value":"warden.admin"}"#);
    }
}
