//! Per-connection session lifecycle.
//!
//! Every accepted WebSocket runs [`run`] on its own task:
//!
//! ```text
//! Unauthenticated ──auth ok──▶ Active ──close / error──▶ Terminated
//!        │
//!        └── bad frame / bad token / timeout ──▶ Rejected
//! ```
//!
//! # Event Loop
//!
//! While Active the session selects over:
//!
//! - Inbound frames from its own socket, routed in receipt order
//! - Outbound frames other sessions queued on its [`Peer`] handle
//!
//! Writes to the socket are bounded by a timeout so a stalled peer ends its
//! own session instead of growing its queue forever.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use crate::auth::TokenSigner;
use crate::config::duration_ms;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, Identity};
use crate::protocol::{Frame, Message, now_ms};
use crate::registry::Registry;
use crate::router::{Route, Router, dispatch};
use crate::transport::Peer;

// ============================================================================
// Types
// ============================================================================

type WsSink<S> = SplitSink<WebSocketStream<S>, WsMessage>;
type WsSource<S> = SplitStream<WebSocketStream<S>>;

// ============================================================================
// SessionContext
// ============================================================================

/// State shared by every session of one hub.
#[derive(Debug)]
pub struct SessionContext {
    /// Verifies handshake tokens.
    pub signer: TokenSigner,
    /// Resolves destinations; owns the registry handle.
    pub router: Router,
    /// Maximum wait for the auth frame.
    pub auth_timeout: Duration,
    /// Maximum time for a single socket write.
    pub write_timeout: Duration,
    /// Depth of each session's outbound queue.
    pub outbound_capacity: usize,
}

impl SessionContext {
    /// Returns the shared registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.router.registry()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Runs one connection from handshake to teardown.
///
/// # Errors
///
/// - [`Error::AuthFailed`], [`Error::AuthTimeout`] or
///   [`Error::DuplicateIdentity`] if the handshake is rejected
/// - [`Error::WriteTimeout`] or [`Error::WebSocket`] if the socket fails
///   while Active
///
/// A peer that disconnects normally yields `Ok(())`.
pub async fn run<S>(
    context: Arc<SessionContext>,
    socket: WebSocketStream<S>,
    addr: SocketAddr,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connection = ConnectionId::next();
    let (mut sink, mut source) = socket.split();

    let identity = match authenticate(&context, &mut source).await {
        Ok(identity) => identity,
        Err(e) if e.is_transport_closed() => {
            debug!(%connection, ?addr, error = %e, "Peer left before authenticating");
            return Err(e);
        }
        Err(e) => {
            warn!(%connection, ?addr, error = %e, "Handshake rejected");
            reject(&mut sink, &e).await;
            return Err(e);
        }
    };

    // The session keeps its own handle so the queue outlives an eviction.
    let (peer, outbound) = Peer::channel(connection, context.outbound_capacity);
    if let Err(e) = context.registry().register(&identity, peer.clone()) {
        warn!(%connection, ?addr, error = %e, "Registration refused");
        reject(&mut sink, &e).await;
        return Err(e);
    }

    info!(%connection, %identity, ?addr, "Session registered");

    let mut session = ActiveSession {
        context: Arc::clone(&context),
        identity,
        connection,
        sink,
        source,
        outbound,
    };
    let result = session.run().await;

    context
        .registry()
        .deregister(&session.identity, session.connection);
    drop(peer);

    match result {
        Err(e) if !e.is_transport_closed() => {
            warn!(%connection, identity = %session.identity, error = %e, "Session ended with error");
            Err(e)
        }
        _ => {
            info!(%connection, identity = %session.identity, "Session disconnected");
            Ok(())
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Waits for the first frame and verifies it as an `auth` message.
async fn authenticate<S>(context: &SessionContext, source: &mut WsSource<S>) -> Result<Identity>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let first = timeout(context.auth_timeout, first_text_frame(source))
        .await
        .map_err(|_| Error::auth_timeout(duration_ms(context.auth_timeout)))??;

    verify_auth_frame(&context.signer, first.as_str())
}

/// Returns the first data frame, skipping transport control frames.
async fn first_text_frame<S>(source: &mut WsSource<S>) -> Result<Utf8Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(text),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(WsMessage::Close(_))) | None => return Err(Error::ConnectionClosed),
            Some(Ok(WsMessage::Binary(_) | WsMessage::Frame(_))) => {
                return Err(Error::auth_failed("first frame is not text"));
            }
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

/// Parses and verifies an auth frame.
fn verify_auth_frame(signer: &TokenSigner, text: &str) -> Result<Identity> {
    let message = serde_json::from_str::<Message>(text)
        .map_err(|e| Error::auth_failed(format!("malformed first frame: {e}")))?;

    let kind = message.kind();
    let Message::Auth { role, id, token } = message else {
        return Err(Error::auth_failed(format!(
            "first frame is {kind}, expected auth"
        )));
    };

    if !signer.verify(role, &id, &token) {
        return Err(Error::auth_failed(format!("bad token for {role} {id}")));
    }

    Ok(Identity::new(role, id))
}

/// Closes a rejected connection with a policy-violation frame.
async fn reject<S>(sink: &mut WsSink<S>, error: &Error)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if error.is_transport_closed() {
        return;
    }

    let reason = match error {
        Error::AuthTimeout { .. } => "auth timeout",
        Error::DuplicateIdentity { .. } => "identity already connected",
        _ => "authentication failed",
    };
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: Utf8Bytes::from_static(reason),
    };

    if let Err(e) = sink.send(WsMessage::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send close frame");
    }
}

// ============================================================================
// ActiveSession
// ============================================================================

/// An authenticated, registered connection.
struct ActiveSession<S> {
    context: Arc<SessionContext>,
    identity: Identity,
    connection: ConnectionId,
    sink: WsSink<S>,
    source: WsSource<S>,
    outbound: mpsc::Receiver<WsMessage>,
}

impl<S> ActiveSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Event loop; returns when either side of the socket is done.
    async fn run(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                // Frames from this session's own socket
                inbound = self.source.next() => {
                    match inbound {
                        Some(Ok(WsMessage::Text(text))) => self.route(text),

                        Some(Ok(WsMessage::Binary(_))) => {
                            warn!(connection = %self.connection, "Binary frame dropped");
                        }

                        Some(Ok(WsMessage::Close(_))) | None => {
                            debug!(connection = %self.connection, "Peer closed connection");
                            return Ok(());
                        }

                        Some(Err(e)) => return Err(e.into()),

                        // Ping/Pong are answered by the transport
                        Some(Ok(_)) => {}
                    }
                }

                // Frames other sessions queued for this one
                queued = self.outbound.recv() => {
                    let Some(message) = queued else {
                        return Ok(());
                    };
                    let closing = message.is_close();
                    self.write(message).await?;
                    if closing {
                        debug!(connection = %self.connection, "Session closed by hub");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Routes one inbound text frame. Malformed frames are dropped.
    fn route(&self, text: Utf8Bytes) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(connection = %self.connection, identity = %self.identity, error = %e, "Malformed frame dropped");
                return;
            }
        };

        let route = self
            .context
            .router
            .resolve(&self.identity, frame.message(), now_ms());

        if let Route::Drop(reason) = &route {
            debug!(
                identity = %self.identity,
                kind = frame.message().kind(),
                %reason,
                "Frame not routed"
            );
            return;
        }

        let report = dispatch(route, &frame);
        if report.failed > 0 {
            warn!(
                identity = %self.identity,
                kind = frame.message().kind(),
                delivered = report.delivered,
                failed = report.failed,
                "Partial fanout"
            );
        }
    }

    /// Writes one frame to the socket within the write timeout.
    async fn write(&mut self, message: WsMessage) -> Result<()> {
        let write_timeout = self.context.write_timeout;
        timeout(write_timeout, self.sink.send(message))
            .await
            .map_err(|_| Error::write_timeout(self.connection, duration_ms(write_timeout)))?
            .map_err(Error::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
