//! Line chat client entry point.
//!
//! Connects to a chat server, logs in with the given name and group, and then
//! relays terminal input to the server and server messages to the terminal
//! until one of the following happens:
//!
//! - the operator presses Ctrl+C,
//! - standard input reaches end of file (Ctrl+D),
//! - the server ends the session or the connection breaks.
//!
//! In every case the client performs the same best-effort `LOGOUT` before it
//! exits.
//!
//! # Usage
//!
//! ```text
//! chat-client --name <NAME> --group <GROUP> [OPTIONS]
//!
//! Options:
//!   --host <HOST>                  Chat server host [default: localhost]
//!   --port <PORT>                  Chat server port [default: 1234]
//!   --poll-interval-ms <MS>        Socket poll interval [default: 5]
//!   --connect-timeout-secs <SECS>  Connect timeout [default: 10]
//!   --log-level <FILTER>           Log filter when RUST_LOG is unset [default: warn]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                    | Flag                     |
//! |-----------------------------|--------------------------|
//! | `CHAT_HOST`                 | `--host`                 |
//! | `CHAT_PORT`                 | `--port`                 |
//! | `CHAT_NAME`                 | `--name`                 |
//! | `CHAT_GROUP`                | `--group`                |
//! | `CHAT_POLL_INTERVAL_MS`     | `--poll-interval-ms`     |
//! | `CHAT_CONNECT_TIMEOUT_SECS` | `--connect-timeout-secs` |
//! | `CHAT_LOG`                  | `--log-level`            |
//!
//! Logs go to stderr so that chat output on stdout stays readable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_client::application::coordinator::ConnectionCoordinator;
use chat_client::config::{ClientConfig, ConfigError, DEFAULT_HOST, DEFAULT_PORT};
use chat_client::infrastructure::terminal;
use chat_core::ClientIdentity;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Terminal chat client.
#[derive(Debug, Parser)]
#[command(name = "chat-client", about = "Terminal client for a line-based chat server", version)]
struct Cli {
    /// Hostname or IP address of the chat server.
    #[arg(long, default_value = DEFAULT_HOST, env = "CHAT_HOST")]
    host: String,

    /// TCP port of the chat server.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "CHAT_PORT")]
    port: u16,

    /// Name shown to other participants.
    #[arg(long, env = "CHAT_NAME")]
    name: String,

    /// Group to join.
    #[arg(long, env = "CHAT_GROUP")]
    group: String,

    /// How often the socket is checked for inbound messages, in milliseconds.
    #[arg(long, default_value_t = 5, env = "CHAT_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Timeout for connecting to the server, in seconds.
    #[arg(long, default_value_t = 10, env = "CHAT_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "warn", env = "CHAT_LOG")]
    log_level: String,
}

impl Cli {
    /// Converts the parsed arguments into a validated [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the name or group cannot be used on the wire, or
    /// if any other setting is out of range.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let identity = ClientIdentity::new(self.name, self.group)
            .map_err(ConfigError::from)
            .context("invalid --name/--group")?;

        let mut config = ClientConfig::new(self.host, self.port, identity);
        config.poll_interval = Duration::from_millis(self.poll_interval_ms);
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The coordinator and terminal loops are plain threads; the Tokio runtime
/// only waits for whichever of Ctrl+C, end of input or end of session comes
/// first.  Blocking coordinator calls go through `spawn_blocking`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.into_client_config()?;
    let server = config.server_label();
    let poll_interval = config.poll_interval;
    info!("chat client starting: server={server}");

    // ── Connect ───────────────────────────────────────────────────────────────
    let coordinator = tokio::task::spawn_blocking(move || ConnectionCoordinator::connect(&config))
        .await
        .context("connect task failed")?
        .with_context(|| format!("could not start chat session with {server}"))?;
    let coordinator = Arc::new(coordinator);
    info!(
        "logged in to {server} as {} in group {}",
        coordinator.identity().name(),
        coordinator.identity().group_id()
    );

    // ── Terminal adapters ─────────────────────────────────────────────────────
    let output = terminal::spawn_output_writer(coordinator.inbound(), poll_interval)
        .context("failed to start terminal output thread")?;

    let (eof_tx, eof_rx) = oneshot::channel::<()>();
    terminal::spawn_input_reader(coordinator.outbound(), move || {
        // The receiver is gone once main has stopped waiting.
        let _ = eof_tx.send(());
    })
    .context("failed to start terminal input thread")?;

    // ── Wait for the first reason to stop ─────────────────────────────────────
    let session = {
        let coordinator = Arc::clone(&coordinator);
        tokio::task::spawn_blocking(move || coordinator.wait_until_disconnected())
    };

    tokio::select! {
        () = ctrl_c() => info!("received Ctrl+C, logging out"),
        _ = eof_rx => info!("end of input, logging out"),
        state = session => match state {
            Ok(state) => info!("session ended by the server ({state:?})"),
            Err(e) => error!("session watcher failed: {e}"),
        },
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::task::spawn_blocking(move || {
        coordinator.shutdown();
        if output.join().is_err() {
            error!("terminal output thread panicked");
        }
    })
    .await
    .context("shutdown task failed")?;

    info!("chat client stopped");
    Ok(())
}

/// Resolves on Ctrl+C.  If the handler cannot be installed it never resolves,
/// leaving the other exit paths in charge.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::IdentityError;

    #[test]
    fn test_cli_defaults() {
        // Arrange / Act
        let cli = Cli::parse_from(["chat-client", "--name", "Adam", "--group", "Group123"]);

        // Assert
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 1234);
        assert_eq!(cli.poll_interval_ms, 5);
        assert_eq!(cli.connect_timeout_secs, 10);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_cli_requires_name_and_group() {
        assert!(Cli::try_parse_from(["chat-client", "--group", "G"]).is_err());
        assert!(Cli::try_parse_from(["chat-client", "--name", "N"]).is_err());
    }

    #[test]
    fn test_into_client_config_applies_overrides() {
        // Arrange
        let cli = Cli::parse_from([
            "chat-client",
            "--host",
            "chat.example.org",
            "--port",
            "4000",
            "--name",
            "Eve",
            "--group",
            "ops",
            "--poll-interval-ms",
            "20",
            "--connect-timeout-secs",
            "3",
        ]);

        // Act
        let config = cli.into_client_config().unwrap();

        // Assert
        assert_eq!(config.server_label(), "chat.example.org:4000");
        assert_eq!(config.identity.name(), "Eve");
        assert_eq!(config.identity.group_id(), "ops");
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_reserved_group_is_rejected() {
        // Arrange
        let cli = Cli::parse_from(["chat-client", "--name", "Eve", "--group", "BROADCAST"]);

        // Act
        let err = cli.into_client_config().unwrap_err();

        // Assert – reported as a configuration error
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Identity(IdentityError::ReservedGroup(_)))
        ));
    }

    #[test]
    fn test_name_with_delimiter_is_rejected() {
        let cli = Cli::parse_from(["chat-client", "--name", "Eve;x", "--group", "ops"]);
        assert!(cli.into_client_config().is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let cli = Cli::parse_from([
            "chat-client",
            "--name",
            "Eve",
            "--group",
            "ops",
            "--poll-interval-ms",
            "0",
        ]);
        assert!(cli.into_client_config().is_err());
    }
}
