//! Relay hub: listener, accept loop and shutdown.
//!
//! # Example
//!
//! ```no_run
//! use robot_relay::Hub;
//!
//! # async fn example() -> robot_relay::Result<()> {
//! let hub = Hub::builder()
//!     .secret("supersecret")
//!     .bind_addr("127.0.0.1:8765".parse().unwrap())
//!     .bind()
//!     .await?;
//!
//! println!("relay listening on {}", hub.ws_url());
//! tokio::signal::ctrl_c().await?;
//! hub.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};

use crate::auth::TokenSigner;
use crate::config::{HubConfig, duration_ms};
use crate::error::{Error, Result};
use crate::identifiers::Identity;
use crate::registry::Registry;
use crate::router::Router;
use crate::session::{self, SessionContext};

use super::builder::HubBuilder;

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Hub
// ============================================================================

/// A running relay hub.
///
/// Owns the listener task and the session registry. Each accepted
/// connection runs its session on its own task.
pub struct Hub {
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// State shared with every session.
    context: Arc<SessionContext>,
    /// Shutdown flag.
    shutdown: AtomicBool,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("local_addr", &self.local_addr)
            .field("robots", &self.robot_count())
            .field("operators", &self.operator_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Hub - Constructor
// ============================================================================

impl Hub {
    /// Creates a configuration builder for the hub.
    #[inline]
    #[must_use]
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Io`] if binding fails
    pub async fn bind(config: HubConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let signer = TokenSigner::new(&config.shared_secret)?;
        let registry = Arc::new(Registry::new(config.duplicate_policy));
        let router = Router::new(registry).with_max_cmd_age(config.max_cmd_age_ms);

        let listener = TcpListener::bind(config.bind).await?;
        let local_addr = listener.local_addr()?;

        let hub = Arc::new(Self {
            local_addr,
            context: Arc::new(SessionContext {
                signer,
                router,
                auth_timeout: config.auth_timeout(),
                write_timeout: config.write_timeout(),
                outbound_capacity: config.outbound_queue,
            }),
            shutdown: AtomicBool::new(false),
        });

        let hub_clone = Arc::clone(&hub);
        tokio::spawn(async move {
            hub_clone.accept_loop(listener).await;
        });

        info!(
            %local_addr,
            policy = ?config.duplicate_policy,
            max_cmd_age_ms = ?config.max_cmd_age_ms,
            "Relay hub listening"
        );

        Ok(hub)
    }
}

// ============================================================================
// Hub - Public API
// ============================================================================

impl Hub {
    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL clients connect to.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the number of registered robots.
    #[inline]
    #[must_use]
    pub fn robot_count(&self) -> usize {
        self.registry().robot_count()
    }

    /// Returns the number of registered operators.
    #[inline]
    #[must_use]
    pub fn operator_count(&self) -> usize {
        self.registry().operator_count()
    }

    /// Returns `true` if `identity` currently has a registered session.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.registry().contains(identity)
    }

    /// Returns the session registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.context.registry()
    }

    /// Returns `true` once [`Hub::shutdown`] has been called.
    #[inline]
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Hub - Lifecycle
// ============================================================================

impl Hub {
    /// Stops accepting connections and closes every registered session.
    pub async fn shutdown(&self) {
        info!("Relay hub shutting down");

        self.shutdown.store(true, Ordering::SeqCst);

        for (identity, peer) in self.registry().drain() {
            if let Err(e) = peer.close(CloseCode::Away, "hub shutting down") {
                debug!(%identity, error = %e, "Session already gone");
            }
        }

        // Give the accept loop one poll to observe the flag.
        tokio::time::sleep(ACCEPT_POLL_INTERVAL).await;

        info!("Relay hub shutdown complete");
    }
}

// ============================================================================
// Hub - Accept Loop
// ============================================================================

impl Hub {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.is_shutting_down() {
                debug!("Accept loop shutting down");
                break;
            }

            // Accept with timeout to allow checking shutdown flag
            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(context, stream, addr).await {
                            debug!(error = %e, ?addr, "Connection ended");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }
}

/// Upgrades a TCP connection to WebSocket and runs its session.
async fn handle_connection(
    context: Arc<SessionContext>,
    stream: TcpStream,
    addr: SocketAddr,
) -> Result<()> {
    debug!(?addr, "New TCP connection");

    if let Err(e) = stream.set_nodelay(true) {
        warn!(error = %e, ?addr, "Failed to set TCP_NODELAY");
    }

    // The upgrade counts against the handshake window.
    let upgrade_timeout = context.auth_timeout;
    let socket = timeout(upgrade_timeout, tokio_tungstenite::accept_async(stream))
        .await
        .map_err(|_| Error::auth_timeout(duration_ms(upgrade_timeout)))?
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    debug!(?addr, "WebSocket connection established");

    session::run(context, socket, addr).await
}

// ============================================================================
// Tests
// ============================================================================
