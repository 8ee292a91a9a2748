//! Shared utilities for the relay binaries.
//!
//! Provides common functionality used across all binaries:
//! - Logging initialization
//! - Shutdown signal handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
///
/// `RUST_LOG` overrides `default_directive` when set.
pub fn init_logging(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves once Ctrl+C is received.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
