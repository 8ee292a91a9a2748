//! Relay message types.
//!
//! Every frame is one JSON object tagged by `type`. Unknown `type` values
//! parse as [`Message::Unknown`] so the hub can ignore them without
//! treating the frame as malformed.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::Role;

// ============================================================================
// Message
// ============================================================================

/// A relay message.
///
/// # Format
///
/// ```json
/// {"type": "cmd", "to": "robot-001", "ts": 1000, "cmd": "drive", "args": {"v": 0.2}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Handshake; must be the first frame on every connection.
    Auth {
        /// Claimed role.
        role: Role,
        /// Claimed identifier.
        id: String,
        /// Hex HMAC token for `role|id`.
        token: String,
    },

    /// Robot status sample, broadcast to operators.
    Telemetry {
        /// Sending robot.
        id: String,
        /// Sample time in epoch milliseconds.
        ts: i64,
        /// Battery voltage.
        bat: f64,
        /// Temperature in degrees Celsius.
        temp: f64,
    },

    /// Operator command for one robot.
    Cmd {
        /// Target robot.
        to: String,
        /// Issue time in epoch milliseconds.
        ts: i64,
        /// Command name.
        cmd: String,
        /// Command arguments.
        #[serde(default)]
        args: Map<String, Value>,
    },

    /// Operator liveness probe for one robot.
    Ping {
        /// Target robot.
        to: String,
        /// Send time in epoch milliseconds.
        ts: i64,
    },

    /// Robot answer to a ping, echoing its `ts`.
    Pong {
        /// Answering robot.
        id: String,
        /// The `ts` of the ping being answered.
        ts: i64,
    },

    /// Free text. Operators address a robot with `to`; robots broadcast.
    Chat {
        /// Target robot (operator-originated only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        /// Sending robot (robot-originated only).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Text body.
        #[serde(default)]
        msg: String,
    },

    /// Any `type` this hub does not know.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl Message {
    /// Returns the wire `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Telemetry { .. } => "telemetry",
            Self::Cmd { .. } => "cmd",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Chat { .. } => "chat",
            Self::Unknown => "unknown",
        }
    }

    /// Creates an auth message.
    #[must_use]
    pub fn auth(role: Role, id: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Auth {
            role,
            id: id.into(),
            token: token.into(),
        }
    }

    /// Creates an operator chat addressed to `to`.
    #[must_use]
    pub fn chat_to(to: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Chat {
            to: Some(to.into()),
            id: None,
            msg: msg.into(),
        }
    }

    /// Creates a robot chat from `id`.
    #[must_use]
    pub fn chat_from(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Chat {
            to: None,
            id: Some(id.into()),
            msg: msg.into(),
        }
    }
}

// ============================================================================
// Freshness
// ============================================================================

/// Returns `true` if a frame stamped `ts` is older than `max_age_ms` at `now_ms`.
///
/// Frames stamped in the future are never stale.
#[inline]
#[must_use]
pub fn is_stale(ts: i64, now_ms: i64, max_age_ms: u64) -> bool {
    let age = now_ms.saturating_sub(ts);
    age > 0 && age.unsigned_abs() > max_age_ms
}

// ============================================================================
// Tests
// ============================================================================
