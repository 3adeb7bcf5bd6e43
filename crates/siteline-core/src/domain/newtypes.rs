//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for domain identifiers and values. Each newtype
//! ensures data validity at construction time, so the rest of the codebase
//! never handles a raw string where an identifier is meant.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID value
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| DomainError::InvalidId(format!("Invalid {}: {e}", stringify!($name))))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id! {
    /// Identifier for internal projects
    ProjectId
}

uuid_id! {
    /// Identifier for an external-project link
    LinkId
}

uuid_id! {
    /// Identifier for a mirrored external record
    RecordId
}

uuid_id! {
    /// Identifier for internal users
    UserId
}

uuid_id! {
    /// Identifier for a sync run log
    RunId
}

// ============================================================================
// Validated string types
// ============================================================================

/// The external platform's identifier for a work item
///
/// Opaque to Siteline; the only requirement is that it is non-empty.
/// Together with the owning link (and module) it forms the identity of
/// a mirrored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Creates an ExternalId, rejecting empty or whitespace-only values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidExternalId(value));
        }
        Ok(Self(value))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A content fingerprint over the externally-owned fields of a record
///
/// Lowercase SHA-256 hex (64 characters). Two payloads with identical
/// projected fields always carry identical fingerprints, which is what
/// change detection relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Creates a Fingerprint, validating the SHA-256 hex format
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(DomainError::InvalidFingerprint(value));
        }
        Ok(Self(value))
    }

    /// Returns the fingerprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Actor - who caused a recorded transition
// ============================================================================

/// The actor responsible for a status-history transition
///
/// Sync-caused transitions are recorded with the literal actor `"sync"`,
/// distinguishing them from user-caused ones in the history trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The synchronization engine
    Sync,
    /// An internal user
    User(UserId),
}

impl Display for Actor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Sync => write!(f, "sync"),
            Actor::User(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "sync" {
            Ok(Actor::Sync)
        } else {
            UserId::from_str(s).map(Actor::User)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_id_roundtrip() {
        let id = RecordId::new();
        let parsed = RecordId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_uuid_id_rejects_garbage() {
        assert!(ProjectId::from_str("not-a-uuid").is_err());
        assert!(LinkId::from_str("").is_err());
    }

    #[test]
    fn test_distinct_id_types() {
        // Same UUID wrapped in different types still serializes identically
        let uuid = Uuid::new_v4();
        let record = RecordId::from_uuid(uuid);
        let link = LinkId::from_uuid(uuid);
        assert_eq!(record.to_string(), link.to_string());
    }

    #[test]
    fn test_external_id_validation() {
        assert!(ExternalId::new("RFI-1042").is_ok());
        assert!(ExternalId::new("").is_err());
        assert!(ExternalId::new("   ").is_err());
    }

    #[test]
    fn test_fingerprint_validation() {
        let valid = "a".repeat(64);
        assert!(Fingerprint::new(valid).is_ok());

        assert!(Fingerprint::new("abc").is_err());
        // Uppercase hex is rejected: fingerprints are canonical lowercase
        let upper = "A".repeat(64);
        assert!(Fingerprint::new(upper).is_err());
        let nonhex = "z".repeat(64);
        assert!(Fingerprint::new(nonhex).is_err());
    }

    #[test]
    fn test_actor_display_and_parse() {
        assert_eq!(Actor::Sync.to_string(), "sync");
        assert_eq!(Actor::from_str("sync").unwrap(), Actor::Sync);

        let user = UserId::new();
        let actor = Actor::User(user);
        let parsed = Actor::from_str(&actor.to_string()).unwrap();
        assert_eq!(parsed, actor);
    }

    #[test]
    fn test_external_id_serde_transparent() {
        let id = ExternalId::new("SUB-77").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"SUB-77\"");
    }
}
