//! Client side of a relay connection.
//!
//! An [`Endpoint`] is one robot or operator connected to a hub. It sends
//! the auth frame on connect and then exchanges relay messages.
//!
//! # Example
//!
//! ```no_run
//! use robot_relay::{Endpoint, Identity, Message, TokenSigner};
//!
//! # async fn example() -> robot_relay::Result<()> {
//! let signer = TokenSigner::new("supersecret")?;
//! let mut operator =
//!     Endpoint::connect("ws://127.0.0.1:8765", Identity::operator("ai-operator"), &signer)
//!         .await?;
//!
//! operator.send(&Message::chat_to("robot-001", "hello")).await?;
//! while let Some(message) = operator.recv().await? {
//!     println!("{message:?}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::{Bytes, Utf8Bytes};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::auth::TokenSigner;
use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::identifiers::{Identity, Role};
use crate::protocol::Message;

// ============================================================================
// Types
// ============================================================================

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Endpoint
// ============================================================================

/// A WebSocket connection to a relay hub.
#[derive(Debug)]
pub struct Endpoint {
    /// Identity sent in the auth frame, if any.
    identity: Option<Identity>,
    /// Underlying socket.
    socket: ClientSocket,
    /// Close frame received from the hub, if any.
    close_frame: Option<CloseFrame>,
}

// ============================================================================
// Endpoint - Constructors
// ============================================================================

impl Endpoint {
    /// Connects to `url` and authenticates as `identity`.
    ///
    /// The hub does not acknowledge a successful handshake; a rejected one
    /// shows up as the connection closing with code 1008.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the WebSocket cannot be opened
    /// - [`Error::WebSocket`] if the auth frame cannot be sent
    pub async fn connect(url: &str, identity: Identity, signer: &TokenSigner) -> Result<Self> {
        let mut endpoint = Self::connect_raw(url).await?;

        let token = signer.sign(identity.role, &identity.id);
        endpoint
            .send(&Message::auth(identity.role, &identity.id, token))
            .await?;

        debug!(%identity, url, "Auth frame sent");
        endpoint.identity = Some(identity);
        Ok(endpoint)
    }

    /// Connects with the identity `config` assigns to `role`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - Any error from [`Endpoint::connect`]
    pub async fn from_config(config: &EndpointConfig, role: Role) -> Result<Self> {
        config.validate()?;
        let signer = TokenSigner::new(&config.shared_secret)?;
        Self::connect(&config.hub_url, config.identity(role), &signer).await
    }

    /// Opens a WebSocket to `url` without sending anything.
    ///
    /// `wss://` URLs are opened over rustls with the webpki root store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the WebSocket cannot be opened.
    pub async fn connect_raw(url: &str) -> Result<Self> {
        if url.starts_with("wss://") {
            install_crypto_provider();
        }

        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to {url}: {e}")))?;

        Ok(Self {
            identity: None,
            socket,
            close_frame: None,
        })
    }
}

// ============================================================================
// Endpoint - Public API
// ============================================================================

impl Endpoint {
    /// Returns the identity this endpoint authenticated as.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Returns the close code the hub sent, once the connection has closed.
    #[inline]
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        self.close_frame.as_ref().map(|frame| frame.code)
    }

    /// Returns the close reason the hub sent, once the connection has closed.
    #[inline]
    #[must_use]
    pub fn close_reason(&self) -> Option<&str> {
        self.close_frame.as_ref().map(|frame| frame.reason.as_str())
    }

    /// Sends a relay message.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the message cannot be serialized
    /// - [`Error::WebSocket`] if the write fails
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.send_raw(text).await
    }

    /// Sends an arbitrary text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the write fails.
    pub async fn send_raw(&mut self, text: impl Into<Utf8Bytes>) -> Result<()> {
        let text = text.into();
        trace!(frame = %text.as_str(), "Sending frame");
        self.socket.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Sends a binary frame. The hub only relays text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the write fails.
    pub async fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.socket.send(WsMessage::Binary(data.into())).await?;
        Ok(())
    }

    /// Receives the next text frame.
    ///
    /// Control frames are skipped. Returns `Ok(None)` once the hub has
    /// closed the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the read fails.
    pub async fn recv_text(&mut self) -> Result<Option<Utf8Bytes>> {
        loop {
            match self.socket.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text)),
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "Hub closed connection");
                    self.close_frame = frame;
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let error = Error::from(e);
                    if error.is_transport_closed() {
                        return Ok(None);
                    }
                    return Err(error);
                }
                None => return Ok(None),
            }
        }
    }

    /// Receives and parses the next relay message.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedMessage`] if the frame is not a relay message
    /// - [`Error::WebSocket`] if the read fails
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        let Some(text) = self.recv_text().await? else {
            return Ok(None);
        };

        serde_json::from_str(text.as_str())
            .map(Some)
            .map_err(|e| Error::malformed(format!("{e}: {}", text.as_str())))
    }

    /// Closes the connection with a normal close frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the close handshake fails.
    pub async fn close(mut self) -> Result<()> {
        match self.socket.close(None).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = Error::from(e);
                if error.is_transport_closed() {
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }
}

// ============================================================================
// TLS
// ============================================================================

/// Installs the ring provider as the process default for rustls.
///
/// A no-op once any provider is installed.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}
