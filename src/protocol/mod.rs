//! Relay wire protocol.
//!
//! One JSON object per WebSocket text frame, tagged by `type`.
//!
//! # Message Types
//!
//! | Type | Sender | Destination |
//! |------|--------|-------------|
//! | `auth` | any | hub (first frame only) |
//! | `telemetry` | robot | all operators |
//! | `cmd` | operator | robot named in `to` |
//! | `ping` | operator | robot named in `to` |
//! | `pong` | robot | all operators |
//! | `chat` | operator | robot named in `to` |
//! | `chat` | robot | all operators |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`Message`] enum and freshness check |
//! | `frame` | [`Frame`]: raw text plus parsed message |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound frame wrapper and clock.
pub mod frame;

/// Message enum.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{Frame, now_ms};
pub use message::{Message, is_stale};
