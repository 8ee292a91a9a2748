//! WebSocket transport layer.
//!
//! Both ends of a relay connection live here: the hub-side [`Peer`]
//! handle sessions deliver through, and the client-side [`Endpoint`]
//! robots and operators connect with.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐        WebSocket        ┌───────────────────────────┐
//! │  Endpoint    │◄───────────────────────►│  Hub session              │
//! │  (robot /    │    text frames, JSON    │   socket ◄── outbound ◄── │ Peer
//! │   operator)  │                         │               queue       │ (clone in
//! └──────────────┘                         └───────────────────────────┘  registry)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Authenticated client connection |
//! | `peer` | Hub-side writable handle to a session |

// ============================================================================
// Submodules
// ============================================================================

/// Authenticated client connection to a hub.
pub mod endpoint;

/// Hub-side handle for queueing frames to a session.
pub mod peer;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::Endpoint;
pub use peer::Peer;
