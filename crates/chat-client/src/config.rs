//! Client configuration types.
//!
//! [`ClientConfig`] is the single source of truth for all runtime settings.
//! The binary builds it from CLI arguments; tests build it directly.  It is
//! a plain value passed into the coordinator, never a global.

use std::time::Duration;

use chat_core::{ClientIdentity, IdentityError};
use thiserror::Error;

/// Server host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Server port used when none is given.
pub const DEFAULT_PORT: u16 = 1234;

/// Upper bound on how long a transmit or receive loop sleeps between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound on a single TCP connect attempt and on a blocked write.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors found while validating a [`ClientConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server host must not be empty")]
    EmptyHost,
    #[error("server port must not be 0")]
    ZeroPort,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,
    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),
}

/// All runtime configuration for one chat session.
///
/// # Example
///
/// ```rust
/// use chat_client::config::{ClientConfig, DEFAULT_PORT};
/// use chat_core::ClientIdentity;
///
/// let identity = ClientIdentity::new("Adam", "Group123").unwrap();
/// let cfg = ClientConfig::new("localhost", DEFAULT_PORT, identity);
/// assert!(cfg.validate().is_ok());
/// assert_eq!(cfg.server_label(), "localhost:1234");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname or IP address of the chat server.
    pub host: String,
    /// TCP port of the chat server.
    pub port: u16,
    /// Name and group presented in every envelope.
    pub identity: ClientIdentity,
    /// Maximum sleep between two checks of a loop's mailbox or socket.
    ///
    /// Outbound lines wake the transmit loop immediately; this interval
    /// bounds how long an inbound line can sit unread in the socket.
    pub poll_interval: Duration,
    /// Timeout for connecting, also applied to blocked socket writes.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Builds a configuration with default timing.
    pub fn new(host: impl Into<String>, port: u16, identity: ClientIdentity) -> Self {
        Self {
            host: host.into(),
            port,
            identity,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Checks the settings the identity type cannot check itself.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        Ok(())
    }

    /// `host:port`, for log and error messages.
    pub fn server_label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
