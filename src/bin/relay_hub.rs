//! Relay hub service.
//!
//! Reads its configuration from the environment and relays until Ctrl+C.
//!
//! Usage: `WS_SHARED_SECRET=... HUB_BIND=0.0.0.0:8765 relay-hub`

mod common;

// ============================================================================
// Imports
// ============================================================================

use robot_relay::{Hub, HubConfig, Result};
use tracing::info;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    common::init_logging("robot_relay=info,relay_hub=info");

    let config = HubConfig::from_env()?;
    let hub = Hub::bind(config).await?;
    info!(url = %hub.ws_url(), "Relay hub ready");

    common::shutdown_signal().await;

    info!(
        robots = hub.robot_count(),
        operators = hub.operator_count(),
        "Stopping relay hub"
    );
    hub.shutdown().await;

    Ok(())
}
