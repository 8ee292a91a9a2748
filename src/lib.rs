//! Robot Relay - Authenticated WebSocket hub between robots and operators.
//!
//! Robots stream telemetry and answer commands; operators send commands,
//! pings and chat. Neither side talks to the other directly: every frame
//! goes through the hub, which authenticates each connection once and then
//! routes by role.
//!
//! # Architecture
//!
//! ```text
//!  robot-001 ──┐                         ┌── ai-operator
//!  robot-002 ──┼──►  Hub  ──► Router ──► ┼── dashboard
//!              │   (auth,      │          │
//!              │   registry)   ▼          │
//!              └──────── per-session outbound queues
//! ```
//!
//! Key design principles:
//!
//! - One session task per connection, owning its socket
//! - The first frame must be a valid `auth`; the role is fixed after that
//! - Routing is a pure decision over (sender role, message) and the registry
//! - Frames are forwarded verbatim, never re-serialized
//! - Fanout is best-effort: one slow or dead peer never blocks the others
//!
//! # Routing
//!
//! | Sender | Message | Destination |
//! |--------|---------|-------------|
//! | robot | `telemetry`, `pong`, `chat` | every operator |
//! | operator | `cmd`, `ping`, `chat` | robot named in `to` |
//! | any | anything else | dropped |
//!
//! # Quick Start
//!
//! ```no_run
//! use robot_relay::{Hub, HubConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Hub::bind(HubConfig::from_env()?).await?;
//!     println!("relay listening on {}", hub.ws_url());
//!
//!     tokio::signal::ctrl_c().await?;
//!     hub.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Token signing and verification |
//! | [`config`] | Environment-sourced configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`hub`] | [`Hub`] listener and [`HubBuilder`] |
//! | [`identifiers`] | [`Role`], [`Identity`], [`ConnectionId`] |
//! | [`protocol`] | Relay message types |
//! | [`registry`] | Live sessions by role and identifier |
//! | [`router`] | Destination resolution and fanout |
//! | [`session`] | Per-connection lifecycle (internal) |
//! | [`transport`] | [`Peer`] handles and the [`Endpoint`] client |

// ============================================================================
// Modules
// ============================================================================

/// Shared-secret tokens binding a role to an identifier.
pub mod auth;

/// Hub and endpoint configuration.
///
/// Defaults layered under environment variables.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Relay hub: listener, accept loop and lifecycle.
///
/// Use [`Hub::builder()`] or [`Hub::bind`] to start one.
pub mod hub;

/// Roles, identities and connection identifiers.
pub mod identifiers;

/// Relay message types.
pub mod protocol;

/// Registry of live sessions.
pub mod registry;

/// Destination resolution and fanout.
pub mod router;

/// Per-connection session lifecycle.
///
/// Internal module driven by the hub's accept loop.
pub mod session;

/// WebSocket transport: hub-side peers and client endpoints.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Hub types
pub use hub::{Hub, HubBuilder};

// Configuration types
pub use config::{EndpointConfig, HubConfig};

// Error types
pub use error::{Error, Result};

// Identity types
pub use auth::TokenSigner;
pub use identifiers::{ConnectionId, Identity, Role};

// Protocol types
pub use protocol::{Frame, Message};

// Routing types
pub use registry::{DuplicatePolicy, Registration, Registry};
pub use router::{DeliveryReport, DropReason, Route, Router};

// Transport types
pub use transport::{Endpoint, Peer};
