//! Type-safe identifiers for relay participants.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Role`] | Which side of the relay a participant is on |
//! | [`Identity`] | Authenticated `(role, id)` pair |
//! | [`ConnectionId`] | Hub-local handle for one WebSocket connection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Role
// ============================================================================

/// Participant role, fixed at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Producer of telemetry, consumer of commands.
    Robot,
    /// Consumer of telemetry, producer of commands.
    Operator,
}

impl Role {
    /// Returns the wire name of the role.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Robot => "robot",
            Self::Operator => "operator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Identity
// ============================================================================

/// An authenticated participant: role plus identifier.
///
/// Identifiers are only unique within a role, so `robot:alpha` and
/// `operator:alpha` are distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Role established at handshake.
    pub role: Role,
    /// Identifier presented in the auth frame.
    pub id: String,
}

impl Identity {
    /// Creates a new identity.
    #[inline]
    #[must_use]
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    /// Creates a robot identity.
    #[inline]
    #[must_use]
    pub fn robot(id: impl Into<String>) -> Self {
        Self::new(Role::Robot, id)
    }

    /// Creates an operator identity.
    #[inline]
    #[must_use]
    pub fn operator(id: impl Into<String>) -> Self {
        Self::new(Role::Operator, id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Hub-local identifier of a single WebSocket connection.
///
/// Two sessions under the same [`Identity`] always have different
/// connection IDs, which is what deregistration compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Robot).unwrap(), "\"robot\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"operator\"").unwrap(),
            Role::Operator
        );
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::robot("robot-001").to_string(), "robot:robot-001");
        assert_eq!(Identity::operator("op").to_string(), "operator:op");
    }

    #[test]
    fn test_identity_scoped_by_role() {
        assert_ne!(Identity::robot("alpha"), Identity::operator("alpha"));
    }

    #[test]
    fn test_connection_ids_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(a.to_string().starts_with("conn-"));
    }
}
