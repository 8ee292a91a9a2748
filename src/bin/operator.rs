//! Demo operator endpoint.
//!
//! Authenticates as `OP_ID`, pings `ROBOT_ID` once per second and logs the
//! round-trip time of every `pong` along with robot chat lines.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use robot_relay::config::EndpointConfig;
use robot_relay::protocol::now_ms;
use robot_relay::{Endpoint, Message, Result, Role};
use tracing::{debug, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Interval between pings.
const PING_PERIOD: Duration = Duration::from_secs(1);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    common::init_logging("robot_relay=info,operator=info");

    let config = EndpointConfig::from_env()?;
    let mut operator = Endpoint::from_config(&config, Role::Operator).await?;
    info!(
        id = %config.operator_id,
        robot = %config.robot_id,
        url = %config.hub_url,
        "Operator connected"
    );

    let mut pinger = tokio::time::interval(PING_PERIOD);
    let shutdown = common::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = pinger.tick() => {
                let ping = Message::Ping {
                    to: config.robot_id.clone(),
                    ts: now_ms(),
                };
                operator.send(&ping).await?;
            }

            incoming = operator.recv() => match incoming {
                Ok(Some(message)) => report(message, now_ms()),
                Ok(None) => {
                    warn!(code = ?operator.close_code(), reason = ?operator.close_reason(), "Hub closed connection");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => warn!(error = %e, "Dropping unreadable frame"),
                Err(e) => return Err(e),
            },

            () = &mut shutdown => break,
        }
    }

    info!("Operator stopping");
    operator.close().await
}

/// Logs one message received from a robot.
fn report(message: Message, now: i64) {
    match message {
        Message::Pong { id, ts } => info!(robot = %id, rtt_ms = now - ts, "Pong"),
        Message::Chat { id, msg, .. } => info!(robot = id.as_deref().unwrap_or("?"), %msg, "Robot chat"),
        Message::Telemetry { id, bat, temp, .. } => debug!(robot = %id, bat, temp, "Telemetry"),
        other => debug!(kind = other.kind(), "Ignoring message"),
    }
}
