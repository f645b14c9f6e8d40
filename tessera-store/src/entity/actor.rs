//! The acting user/tenant context and audit stamps

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Who is performing the operation
///
/// Carries the caller identity used for audit stamps plus the tenant's own
/// connection string, when it has one. An empty connection string means the
/// default connection from [`StoreConfig`](crate::config::StoreConfig).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Actor {
    /// Store identity of the acting user, when known
    pub id: Option<ObjectId>,
    /// Username fallback for audit stamps
    pub username: String,
    /// Tenant-owned connection string; empty means the default
    pub connection: String,
}

impl Actor {
    /// Create an actor from a username
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Create an actor with a resolved identity
    pub fn with_id(id: ObjectId, username: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            username: username.into(),
            connection: String::new(),
        }
    }

    /// Whether this actor carries enough identity to act
    pub fn is_identified(&self) -> bool {
        self.id.is_some() || !self.username.is_empty()
    }

    /// Produce an audit stamp for this actor at the current instant
    pub fn stamp(&self) -> ActorStamp {
        let actor = match self.id {
            Some(id) => id.to_hex(),
            None => self.username.clone(),
        };
        ActorStamp {
            actor,
            at: mongodb::bson::DateTime::now(),
        }
    }
}

/// An audit stamp: who did it and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStamp {
    /// Actor id (hex) when resolved, username otherwise
    #[serde(rename = "user")]
    pub actor: String,
    /// When the action happened
    #[serde(rename = "time")]
    pub at: mongodb::bson::DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_prefers_id_over_username() {
        let id = ObjectId::new();
        let actor = Actor::with_id(id, "ada");
        assert_eq!(actor.stamp().actor, id.to_hex());
    }

    #[test]
    fn test_stamp_falls_back_to_username() {
        let actor = Actor::new("ada");
        assert_eq!(actor.stamp().actor, "ada");
    }

    #[test]
    fn test_is_identified() {
        assert!(!Actor::default().is_identified());
        assert!(Actor::new("ada").is_identified());
        assert!(Actor::with_id(ObjectId::new(), "").is_identified());
    }
}
