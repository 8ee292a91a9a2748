//! Inbound frames: the received text plus its parsed message.
//!
//! The hub routes on the parsed [`Message`] but forwards the original text,
//! so recipients see exactly the bytes the sender produced.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::from_str;
use tokio_tungstenite::tungstenite::Utf8Bytes;

use crate::error::{Error, Result};

use super::Message;

// ============================================================================
// Frame
// ============================================================================

/// A parsed inbound text frame.
#[derive(Debug, Clone)]
pub struct Frame {
    text: Utf8Bytes,
    message: Message,
}

impl Frame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the text is not a JSON object
    /// with a `type` tag and the fields that type requires.
    pub fn parse(text: Utf8Bytes) -> Result<Self> {
        let message = from_str::<Message>(text.as_str()).map_err(|e| Error::malformed(e.to_string()))?;
        Ok(Self { text, message })
    }

    /// Returns the parsed message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Returns the original text, shared rather than copied.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &Utf8Bytes {
        &self.text
    }

    /// Returns the original text as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

// ============================================================================
// Tests
// ============================================================================
