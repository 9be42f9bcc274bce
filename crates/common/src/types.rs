use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single ticket unit.
///
/// Wraps a UUID so ticket IDs cannot be mixed up with hold IDs or
/// other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random ticket ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ticket ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TicketId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TicketId> for Uuid {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

/// Unique identifier for a hold (a time-bounded claim on ticket units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldId(Uuid);

impl HoldId {
    /// Creates a new random hold ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a hold ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for HoldId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HoldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for HoldId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<HoldId> for Uuid {
    fn from(id: HoldId) -> Self {
        id.0
    }
}

/// Identifier of an event tier (a pool of interchangeable ticket capacity).
///
/// Tier IDs are chosen by the organizer, so they are free-form strings
/// rather than generated UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierId(String);

impl TierId {
    /// Creates a new tier ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tier ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TierId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TierId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque reference to a prospective buyer.
///
/// The engine never interprets this value; it is recorded on held and
/// sold units so tickets can be looked up per buyer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderRef(String);

impl HolderRef {
    /// Creates a holder reference from a string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HolderRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HolderRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}
