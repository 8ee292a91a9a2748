//! Environment-sourced configuration for the hub and demo endpoints.
//!
//! Defaults are layered under environment variables with `figment`.
//!
//! # Hub Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `WS_SHARED_SECRET` | [`HubConfig::shared_secret`] | `supersecret` |
//! | `HUB_BIND` | [`HubConfig::bind`] | `127.0.0.1:8765` |
//! | `AUTH_TIMEOUT_MS` | [`HubConfig::auth_timeout_ms`] | `5000` |
//! | `WRITE_TIMEOUT_MS` | [`HubConfig::write_timeout_ms`] | `5000` |
//! | `OUTBOUND_QUEUE` | [`HubConfig::outbound_queue`] | `256` |
//! | `DUPLICATE_POLICY` | [`HubConfig::duplicate_policy`] | `replace` |
//! | `HUB_CMD_MAX_AGE_MS` | [`HubConfig::max_cmd_age_ms`] | unset |
//!
//! # Endpoint Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `WS_SHARED_SECRET` | [`EndpointConfig::shared_secret`] | `supersecret` |
//! | `WSS_URL` | [`EndpointConfig::hub_url`] | `ws://127.0.0.1:8765` |
//! | `ROBOT_ID` | [`EndpointConfig::robot_id`] | `robot-001` |
//! | `OP_ID` | [`EndpointConfig::operator_id`] | `ai-operator` |
//! | `CMD_MAX_AGE_MS` | [`EndpointConfig::cmd_max_age_ms`] | `2000` |

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use figment::value::{Uncased, UncasedStr};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{Identity, Role};
use crate::registry::DuplicatePolicy;

// ============================================================================
// Constants
// ============================================================================

/// Shared secret used when none is configured.
pub const DEFAULT_SECRET: &str = "supersecret";

/// Default hub port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default wait for the auth frame.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default depth of each session's outbound queue.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Default maximum command age enforced by robots.
pub const DEFAULT_CMD_MAX_AGE_MS: u64 = 2000;

/// Environment variable to field mapping for [`HubConfig`].
const HUB_ENV: &[(&str, &str)] = &[
    ("WS_SHARED_SECRET", "shared_secret"),
    ("HUB_BIND", "bind"),
    ("AUTH_TIMEOUT_MS", "auth_timeout_ms"),
    ("WRITE_TIMEOUT_MS", "write_timeout_ms"),
    ("OUTBOUND_QUEUE", "outbound_queue"),
    ("DUPLICATE_POLICY", "duplicate_policy"),
    ("HUB_CMD_MAX_AGE_MS", "max_cmd_age_ms"),
];

/// Environment variable to field mapping for [`EndpointConfig`].
const ENDPOINT_ENV: &[(&str, &str)] = &[
    ("WS_SHARED_SECRET", "shared_secret"),
    ("WSS_URL", "hub_url"),
    ("ROBOT_ID", "robot_id"),
    ("OP_ID", "operator_id"),
    ("CMD_MAX_AGE_MS", "cmd_max_age_ms"),
];

// ============================================================================
// HubConfig
// ============================================================================

/// Hub settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Secret every token is derived from.
    pub shared_secret: String,
    /// Listen address; port 0 picks a free port.
    pub bind: SocketAddr,
    /// Maximum wait for the auth frame, in milliseconds.
    pub auth_timeout_ms: u64,
    /// Maximum time for a single socket write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Depth of each session's outbound queue.
    pub outbound_queue: usize,
    /// What to do when an identity connects twice.
    pub duplicate_policy: DuplicatePolicy,
    /// Drop `cmd`/`ping` older than this many milliseconds; unset disables.
    pub max_cmd_age_ms: Option<u64>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            shared_secret: DEFAULT_SECRET.to_string(),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            auth_timeout_ms: duration_ms(DEFAULT_AUTH_TIMEOUT),
            write_timeout_ms: duration_ms(DEFAULT_WRITE_TIMEOUT),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            duplicate_policy: DuplicatePolicy::Replace,
            max_cmd_age_ms: None,
        }
    }
}

impl HubConfig {
    /// Defaults layered under the hub environment variables.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(&env_names(HUB_ENV)).map(hub_key))
    }

    /// Loads and validates the hub configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the hub relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty secret, a zero timeout or a
    /// zero-length queue.
    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.is_empty() {
            return Err(Error::config("shared secret is empty"));
        }
        if self.auth_timeout_ms == 0 {
            return Err(Error::config("auth timeout must be greater than zero"));
        }
        if self.write_timeout_ms == 0 {
            return Err(Error::config("write timeout must be greater than zero"));
        }
        if self.outbound_queue == 0 {
            return Err(Error::config("outbound queue must hold at least one frame"));
        }
        Ok(())
    }

    /// Auth timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    /// Write timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ============================================================================
// EndpointConfig
// ============================================================================

/// Settings for a robot or operator endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Secret the endpoint token is derived from.
    pub shared_secret: String,
    /// Hub WebSocket URL.
    pub hub_url: String,
    /// Robot identifier; the operator uses it as its ping/command target.
    pub robot_id: String,
    /// Operator identifier.
    pub operator_id: String,
    /// Robots drop commands older than this many milliseconds.
    pub cmd_max_age_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            shared_secret: DEFAULT_SECRET.to_string(),
            hub_url: format!("ws://127.0.0.1:{DEFAULT_PORT}"),
            robot_id: "robot-001".to_string(),
            operator_id: "ai-operator".to_string(),
            cmd_max_age_ms: DEFAULT_CMD_MAX_AGE_MS,
        }
    }
}

impl EndpointConfig {
    /// Defaults layered under the endpoint environment variables.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(&env_names(ENDPOINT_ENV)).map(endpoint_key))
    }

    /// Loads and validates the endpoint configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed, the secret
    /// is empty or the hub URL is not a `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the secret and hub URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on an empty secret or a non-WebSocket URL.
    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.is_empty() {
            return Err(Error::config("shared secret is empty"));
        }

        let url = Url::parse(&self.hub_url)
            .map_err(|e| Error::config(format!("invalid hub URL {}: {e}", self.hub_url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "hub URL must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Returns the identity this endpoint claims for `role`.
    #[must_use]
    pub fn identity(&self, role: Role) -> Identity {
        match role {
            Role::Robot => Identity::robot(self.robot_id.clone()),
            Role::Operator => Identity::operator(self.operator_id.clone()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn env_names(mapping: &[(&'static str, &'static str)]) -> Vec<&'static str> {
    mapping.iter().map(|(var, _)| *var).collect()
}

fn rename_key<'a>(mapping: &[(&'static str, &'static str)], key: &'a UncasedStr) -> Uncased<'a> {
    mapping
        .iter()
        .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
        .map_or(key.as_str(), |&(_, field)| field)
        .into()
}

fn hub_key(key: &UncasedStr) -> Uncased<'_> {
    rename_key(HUB_ENV, key)
}

fn endpoint_key(key: &UncasedStr) -> Uncased<'_> {
    rename_key(ENDPOINT_ENV, key)
}

/// Milliseconds in `duration`, saturating.
#[inline]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
