//! Error types for the relay hub.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use robot_relay::{Hub, Result};
//!
//! async fn example() -> Result<()> {
//!     let hub = Hub::builder().secret("supersecret").bind().await?;
//!     println!("listening on {}", hub.ws_url());
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Authentication | [`Error::AuthFailed`], [`Error::AuthTimeout`], [`Error::DuplicateIdentity`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::WriteTimeout`] |
//! | Protocol | [`Error::MalformedMessage`] |
//! | Delivery | [`Error::DeliveryFailed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::ProtocolError;

use crate::identifiers::{ConnectionId, Identity};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when hub or endpoint configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Authentication Errors
    // ========================================================================
    /// Handshake rejected.
    ///
    /// Returned when the first frame is not a valid `auth` message or the
    /// token does not match.
    #[error("Authentication failed: {reason}")]
    AuthFailed {
        /// Why the handshake was rejected.
        reason: String,
    },

    /// No auth frame within the handshake window.
    #[error("Authentication timeout after {timeout_ms}ms")]
    AuthTimeout {
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    /// Identity already registered under the reject policy.
    #[error("Identity already connected: {identity}")]
    DuplicateIdentity {
        /// The identity that is already live.
        identity: Identity,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Writing to a peer socket took too long.
    #[error("Write to connection {connection} timed out after {timeout_ms}ms")]
    WriteTimeout {
        /// The stalled connection.
        connection: ConnectionId,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Frame could not be parsed as a message.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Frame could not be queued for a destination.
    #[error("Delivery to connection {connection} failed: {reason}")]
    DeliveryFailed {
        /// The destination connection.
        connection: ConnectionId,
        /// Why the frame was not queued.
        reason: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an authentication failure.
    #[inline]
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    /// Creates an authentication timeout error.
    #[inline]
    pub fn auth_timeout(timeout_ms: u64) -> Self {
        Self::AuthTimeout { timeout_ms }
    }

    /// Creates a duplicate identity error.
    #[inline]
    pub fn duplicate_identity(identity: Identity) -> Self {
        Self::DuplicateIdentity { identity }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a write timeout error.
    #[inline]
    pub fn write_timeout(connection: ConnectionId, timeout_ms: u64) -> Self {
        Self::WriteTimeout {
            connection,
            timeout_ms,
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a delivery failure.
    #[inline]
    pub fn delivery_failed(connection: ConnectionId, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            connection,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the error rejects a handshake.
    #[inline]
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed { .. } | Self::AuthTimeout { .. } | Self::DuplicateIdentity { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WriteTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the peer simply went away.
    ///
    /// A vanished peer ends its session normally instead of being reported.
    #[must_use]
    pub fn is_transport_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed) => true,
            Self::WebSocket(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                true
            }
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Returns `true` if the session survives this error.
    ///
    /// Recoverable errors drop a single frame or a single delivery.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::DeliveryFailed { .. } | Self::Json(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use crate::identifiers::Role;

    #[test]
    fn test_error_display() {
        let err = Error::auth_failed("bad token");
        assert_eq!(err.to_string(), "Authentication failed: bad token");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("shared secret is empty");
        assert_eq!(err.to_string(), "Configuration error: shared secret is empty");
    }

    #[test]
    fn test_duplicate_identity_display() {
        let err = Error::duplicate_identity(Identity::new(Role::Robot, "R1"));
        assert_eq!(err.to_string(), "Identity already connected: robot:R1");
    }

    #[test]
    fn test_is_auth_failure() {
        assert!(Error::auth_failed("x").is_auth_failure());
        assert!(Error::auth_timeout(5000).is_auth_failure());
        assert!(!Error::ConnectionClosed.is_auth_failure());
        assert!(!Error::malformed("x").is_auth_failure());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::write_timeout(ConnectionId::next(), 10).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_transport_closed() {
        assert!(Error::ConnectionClosed.is_transport_closed());
        assert!(Error::WebSocket(WsError::ConnectionClosed).is_transport_closed());
        assert!(Error::Io(IoError::new(ErrorKind::ConnectionReset, "reset")).is_transport_closed());
        assert!(!Error::auth_failed("x").is_transport_closed());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::malformed("not json").is_recoverable());
        assert!(Error::delivery_failed(ConnectionId::next(), "queue full").is_recoverable());
        assert!(!Error::auth_failed("x").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
