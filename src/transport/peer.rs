//! Writable handle to one connected session.
//!
//! A [`Peer`] is what the registry stores and what the router hands back.
//! It wraps the sending half of the session's bounded outbound queue, so
//! delivering to a peer never waits on that peer's socket.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

// ============================================================================
// Peer
// ============================================================================

/// Handle for queueing frames to a live session.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Connection this handle writes to.
    connection: ConnectionId,
    /// Sending half of the session's outbound queue.
    outbound: mpsc::Sender<WsMessage>,
}

impl Peer {
    /// Creates a handle and the queue receiver its session drains.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn channel(connection: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<WsMessage>) {
        let (outbound, rx) = mpsc::channel(capacity);
        (
            Self {
                connection,
                outbound,
            },
            rx,
        )
    }

    /// Returns the connection this handle writes to.
    #[inline]
    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Returns `true` once the session has stopped draining its queue.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Queues a text frame without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::DeliveryFailed`] if the queue is full
    /// - [`Error::ConnectionClosed`] if the session has ended
    pub fn deliver(&self, text: Utf8Bytes) -> Result<()> {
        self.enqueue(WsMessage::Text(text))
    }

    /// Asks the session to close its socket with `code`.
    ///
    /// # Errors
    ///
    /// Same as [`Peer::deliver`].
    pub fn close(&self, code: CloseCode, reason: &'static str) -> Result<()> {
        self.enqueue(WsMessage::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        })))
    }

    fn enqueue(&self, message: WsMessage) -> Result<()> {
        self.outbound.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::delivery_failed(self.connection, "outbound queue full"),
            TrySendError::Closed(_) => Error::ConnectionClosed,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
