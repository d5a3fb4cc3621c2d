//! Identity types for agora
//!
//! Record identifiers are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types. Agent identifiers are
//! caller-chosen strings (e.g. `data_provider_001`), matching how agents
//! introduce themselves on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate UUID-backed ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(RfpId, "rfp", "Unique identifier for a request-for-proposal");
define_id_type!(BidId, "bid", "Unique identifier for a bid");
define_id_type!(AssignmentId, "assign", "Unique identifier for a task assignment");
define_id_type!(RatingId, "rating", "Unique identifier for a provider rating");

/// Caller-chosen agent identifier.
///
/// Agents pick their own IDs at registration time; uniqueness is enforced by
/// the registry (re-registering the same ID updates the existing record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_display() {
        let id = RfpId::new();
        assert!(id.to_string().starts_with("rfp_"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = BidId::new();
        let parsed = BidId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_bare_uuid() {
        let id = AssignmentId::new();
        let parsed = AssignmentId::parse(&id.0.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_agent_id_is_plain_string_on_the_wire() {
        let id = AgentId::new("data_provider_001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"data_provider_001\"");
    }
}
