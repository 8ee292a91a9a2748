//! Registry of live sessions, one table per role.
//!
//! Sessions register once after a successful handshake and deregister
//! once at teardown. Routing reads the tables to find destinations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                Registry                  │
//! │  robots                                  │
//! │  ┌────────────────────────────────────┐  │
//! │  │ "robot-001"   → Peer (conn-3)      │  │
//! │  │ "robot-002"   → Peer (conn-7)      │  │
//! │  └────────────────────────────────────┘  │
//! │  operators                               │
//! │  ┌────────────────────────────────────┐  │
//! │  │ "ai-operator" → Peer (conn-1)      │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Each table sits behind its own lock. Lookups clone the [`Peer`] handles
//! out of the table, so no lock is held while frames are delivered.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, Identity, Role};
use crate::transport::Peer;

// ============================================================================
// Types
// ============================================================================

/// Map of identifiers to live session handles.
type PeerTable = FxHashMap<String, Peer>;

// ============================================================================
// DuplicatePolicy
// ============================================================================

/// What to do when an identity registers while already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// The newer session takes over the entry. The older one keeps its
    /// socket but is no longer reachable through the registry.
    #[default]
    Replace,
    /// The newer session is refused.
    Reject,
}

// ============================================================================
// Registration
// ============================================================================

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The identity was not registered before.
    Fresh,
    /// The identity was registered by another connection, now evicted.
    Replaced(ConnectionId),
}

// ============================================================================
// Registry
// ============================================================================

/// Live sessions keyed by identifier, one table per role.
///
/// Thread-safe, shared by every session task of a hub.
#[derive(Debug, Default)]
pub struct Registry {
    /// Robot sessions by robot identifier.
    robots: RwLock<PeerTable>,
    /// Operator sessions by operator identifier.
    operators: RwLock<PeerTable>,
    /// Policy for an identity that is already registered.
    policy: DuplicatePolicy,
}

// ============================================================================
// Registry - Constructor
// ============================================================================

impl Registry {
    /// Creates an empty registry with the given duplicate policy.
    #[inline]
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            robots: RwLock::new(PeerTable::default()),
            operators: RwLock::new(PeerTable::default()),
            policy,
        }
    }

    /// Returns the duplicate policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    #[inline]
    fn table(&self, role: Role) -> &RwLock<PeerTable> {
        match role {
            Role::Robot => &self.robots,
            Role::Operator => &self.operators,
        }
    }
}

// ============================================================================
// Registry - Mutation
// ============================================================================

impl Registry {
    /// Registers `peer` under `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateIdentity`] if the identity is already
    /// registered and the policy is [`DuplicatePolicy::Reject`].
    pub fn register(&self, identity: &Identity, peer: Peer) -> Result<Registration> {
        let connection = peer.connection();
        let mut table = self.table(identity.role).write();

        if self.policy == DuplicatePolicy::Reject && table.contains_key(&identity.id) {
            return Err(Error::duplicate_identity(identity.clone()));
        }

        let registration = match table.insert(identity.id.clone(), peer) {
            Some(evicted) => Registration::Replaced(evicted.connection()),
            None => Registration::Fresh,
        };
        drop(table);

        if let Registration::Replaced(evicted) = registration {
            warn!(
                %identity,
                %evicted,
                %connection,
                "Identity re-registered, older session evicted"
            );
        }

        Ok(registration)
    }

    /// Removes `identity` if its entry still belongs to `connection`.
    ///
    /// Returns `true` if an entry was removed. An entry taken over by a
    /// newer session is left alone.
    pub fn deregister(&self, identity: &Identity, connection: ConnectionId) -> bool {
        let mut table = self.table(identity.role).write();

        match table.get(&identity.id).map(Peer::connection) {
            Some(owner) if owner == connection => {
                table.remove(&identity.id);
                true
            }
            Some(owner) => {
                debug!(
                    %identity,
                    %connection,
                    %owner,
                    "Entry owned by newer session, not removed"
                );
                false
            }
            None => false,
        }
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(Identity, Peer)> {
        let mut drained: Vec<_> = self
            .robots
            .write()
            .drain()
            .map(|(id, peer)| (Identity::robot(id), peer))
            .collect();
        drained.extend(
            self.operators
                .write()
                .drain()
                .map(|(id, peer)| (Identity::operator(id), peer)),
        );

        drained
    }
}

// ============================================================================
// Registry - Lookup
// ============================================================================

impl Registry {
    /// Returns the session registered as robot `id`.
    #[must_use]
    pub fn robot(&self, id: &str) -> Option<Peer> {
        self.robots.read().get(id).cloned()
    }

    /// Snapshots every registered operator.
    #[must_use]
    pub fn operators(&self) -> Vec<Peer> {
        self.operators.read().values().cloned().collect()
    }

    /// Returns the session registered under `identity`.
    #[must_use]
    pub fn get(&self, identity: &Identity) -> Option<Peer> {
        self.table(identity.role).read().get(&identity.id).cloned()
    }

    /// Returns `true` if `identity` is registered.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.table(identity.role).read().contains_key(&identity.id)
    }

    /// Returns the number of registered robots.
    #[inline]
    #[must_use]
    pub fn robot_count(&self) -> usize {
        self.robots.read().len()
    }

    /// Returns the number of registered operators.
    #[inline]
    #[must_use]
    pub fn operator_count(&self) -> usize {
        self.operators.read().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    fn peer() -> Peer {
        Peer::channel(ConnectionId::next(), 8).0
    }

    #[test]
    fn test_register_robot_only_in_robot_table() {
        let registry = Registry::default();
        let identity = Identity::robot("R1");

        let registration = registry.register(&identity, peer()).unwrap();

        assert_eq!(registration, Registration::Fresh);
        assert!(registry.contains(&identity));
        assert!(!registry.contains(&Identity::operator("R1")));
        assert_eq!(registry.robot_count(), 1);
        assert_eq!(registry.operator_count(), 0);
    }

    #[test]
    fn test_replace_policy_evicts_older_entry() {
        let registry = Registry::new(DuplicatePolicy::Replace);
        let identity = Identity::robot("R1");
        let first = peer();
        let second = peer();

        registry.register(&identity, first.clone()).unwrap();
        let registration = registry.register(&identity, second.clone()).unwrap();

        assert_eq!(registration, Registration::Replaced(first.connection()));
        assert_eq!(
            registry.robot("R1").map(|p| p.connection()),
            Some(second.connection())
        );
    }

    #[test]
    fn test_reject_policy_refuses_duplicate() {
        let registry = Registry::new(DuplicatePolicy::Reject);
        let identity = Identity::operator("O1");
        let first = peer();

        registry.register(&identity, first.clone()).unwrap();
        let err = registry.register(&identity, peer()).unwrap_err();

        assert!(matches!(err, Error::DuplicateIdentity { .. }));
        assert_eq!(
            registry.get(&identity).map(|p| p.connection()),
            Some(first.connection())
        );
    }

    #[test]
    fn test_deregister_only_removes_own_entry() {
        let registry = Registry::default();
        let identity = Identity::robot("R1");
        let stale = peer();
        let current = peer();

        registry.register(&identity, stale.clone()).unwrap();
        registry.register(&identity, current.clone()).unwrap();

        assert!(!registry.deregister(&identity, stale.connection()));
        assert!(registry.contains(&identity));

        assert!(registry.deregister(&identity, current.connection()));
        assert!(!registry.contains(&identity));
    }

    #[test]
    fn test_deregister_unknown_identity() {
        let registry = Registry::default();
        assert!(!registry.deregister(&Identity::robot("ghost"), ConnectionId::next()));
    }

    #[test]
    fn test_operators_snapshot() {
        let registry = Registry::default();
        registry.register(&Identity::operator("O1"), peer()).unwrap();
        registry.register(&Identity::operator("O2"), peer()).unwrap();
        registry.register(&Identity::robot("R1"), peer()).unwrap();

        let snapshot = registry.operators();
        assert_eq!(snapshot.len(), 2);

        registry.register(&Identity::operator("O3"), peer()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.operator_count(), 3);
    }

    #[test]
    fn test_drain_empties_both_tables() {
        let registry = Registry::default();
        registry.register(&Identity::operator("O1"), peer()).unwrap();
        registry.register(&Identity::robot("R1"), peer()).unwrap();

        let drained = registry.drain();

        assert_eq!(drained.len(), 2);
        assert!(drained.iter().any(|(identity, _)| *identity == Identity::robot("R1")));
        assert_eq!(registry.robot_count() + registry.operator_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(Registry::default());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let identity = Identity::operator(format!("op-{i}"));
                    let handle = peer();
                    let connection = handle.connection();
                    registry.register(&identity, handle).unwrap();
                    tokio::task::yield_now().await;
                    if i % 2 == 0 {
                        registry.deregister(&identity, connection);
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.operator_count(), 16);
    }
}
