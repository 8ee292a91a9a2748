//! Builder pattern for hub configuration.
//!
//! Provides a fluent API over [`HubConfig`] for tests and embedders that
//! do not read the environment.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use robot_relay::{DuplicatePolicy, Hub};
//!
//! # async fn example() -> robot_relay::Result<()> {
//! let hub = Hub::builder()
//!     .secret("supersecret")
//!     .bind_addr("0.0.0.0:8765".parse().unwrap())
//!     .auth_timeout(Duration::from_secs(2))
//!     .duplicate_policy(DuplicatePolicy::Reject)
//!     .bind()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{HubConfig, duration_ms};
use crate::error::Result;
use crate::registry::DuplicatePolicy;

use super::core::Hub;

// ============================================================================
// HubBuilder
// ============================================================================

/// Builder for configuring a [`Hub`].
///
/// Use [`Hub::builder()`] to create a new builder. Unset fields keep the
/// [`HubConfig`] defaults.
#[derive(Debug, Default, Clone)]
pub struct HubBuilder {
    config: HubConfig,
}

// ============================================================================
// HubBuilder Implementation
// ============================================================================

impl HubBuilder {
    /// Creates a builder holding the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[inline]
    #[must_use]
    pub fn from_config(config: HubConfig) -> Self {
        Self { config }
    }

    /// Sets the shared secret tokens are derived from.
    #[inline]
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.shared_secret = secret.into();
        self
    }

    /// Sets the listen address. Port 0 picks a free port.
    #[inline]
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    /// Sets how long a connection may take to authenticate.
    #[inline]
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the bound on a single socket write.
    #[inline]
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the depth of each session's outbound queue.
    #[inline]
    #[must_use]
    pub fn outbound_queue(mut self, capacity: usize) -> Self {
        self.config.outbound_queue = capacity;
        self
    }

    /// Sets what happens when an identity connects twice.
    #[inline]
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicate_policy = policy;
        self
    }

    /// Drops `cmd` and `ping` frames older than `max_age_ms` at the hub.
    ///
    /// `None` disables the check.
    #[inline]
    #[must_use]
    pub fn max_cmd_age(mut self, max_age_ms: Option<u64>) -> Self {
        self.config.max_cmd_age_ms = max_age_ms;
        self
    }

    /// Returns the validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if a setting is
    /// invalid.
    pub fn build(self) -> Result<HubConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validates the configuration and starts the hub.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if a setting is invalid
    /// - [`Error::Io`](crate::Error::Io) if binding fails
    pub async fn bind(self) -> Result<Arc<Hub>> {
        Hub::bind(self.build()?).await
    }
}

// ============================================================================
// Tests
// ============================================================================
