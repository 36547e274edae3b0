//! ConnectionCoordinator: session lifecycle plus the transmit and receive loops.
//!
//! The coordinator owns the [`LineTransport`] and the two [`Mailbox`]es.  Once
//! [`ConnectionCoordinator::start`] has sent the `LOGIN` envelope it spawns
//! two named threads:
//!
//! ```text
//!  terminal input ──► outbound ──► [chat-transmit] ──┐
//!                                                    ├──► transport (one lock)
//!  terminal output ◄── inbound ◄── [chat-receive] ◄──┘
//! ```
//!
//! # Wake-ups
//!
//! The loops never wake each other.  The transmit loop sleeps on the outbound
//! mailbox, so a queued line is sent at once; the receive loop sleeps on the
//! connection state, so a shutdown stops it at once.  Both sleeps are bounded
//! by the poll interval, which is how often the socket is checked for input.
//!
//! # Locking
//!
//! Every socket call happens under the single transport mutex, so transmit and
//! receive never touch the socket at the same time.  The transport lock and a
//! mailbox lock are never held together: lines are encoded before the
//! transport is locked and decoded after it is released.
//!
//! # Ending a session
//!
//! A session ends in one of three ways:
//!
//! 1. The host calls [`ConnectionCoordinator::shutdown`].  Pending outbound
//!    lines are flushed, `LOGOUT` is sent best-effort, the transport is
//!    closed and the state becomes `Closed`.
//! 2. The server sends an envelope marked `EXTRA:SHUTDOWN`.  The receive loop
//!    closes the transport and moves to `ShuttingDown`; the envelope itself is
//!    never shown to the operator.
//! 3. A read or write fails.  The failing loop closes the transport and moves
//!    to `ShuttingDown`.  There is no reconnection.
//!
//! In cases 2 and 3 [`wait_until_disconnected`](ConnectionCoordinator::wait_until_disconnected)
//! returns, and the host is expected to call `shutdown` to finish the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chat_core::protocol::messages::{LOGIN_BODY, LOGOUT_BODY};
use chat_core::{
    decode_envelope, encode_message, is_shutdown_signal, ClientIdentity, ExtraFlag, Mailbox,
    ProtocolError,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::state::{ConnectionState, StateCell, TransitionError};
use crate::config::{ClientConfig, ConfigError};
use crate::infrastructure::transport::{LineTransport, TcpTransport, TransportError};

/// Most inbound lines read under one hold of the transport lock.  The rest
/// wait for the next tick so a flooding server cannot starve the transmit
/// loop.
pub const MAX_LINES_PER_TICK: usize = 64;

/// Errors that prevent a session from starting.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    State(#[from] TransitionError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// State shared between the coordinator handle and its two worker threads.
struct Shared {
    identity: ClientIdentity,
    poll_interval: Duration,
    transport: Mutex<Box<dyn LineTransport>>,
    state: StateCell,
    outbound: Arc<Mailbox>,
    inbound: Arc<Mailbox>,
    shutdown_requested: AtomicBool,
}

/// Why a worker loop ended the session.
enum SessionEnd {
    /// The server sent its shutdown envelope.
    ServerShutdown,
    /// The socket failed or was closed underneath us.
    Lost(TransportError),
}

/// Owns one chat session.
///
/// Dropping the coordinator performs [`shutdown`](Self::shutdown).
pub struct ConnectionCoordinator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionCoordinator {
    /// Connects over TCP as described by `config` and starts the session.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Config`] for invalid settings and
    /// [`CoordinatorError::Transport`] when the server cannot be reached.
    pub fn connect(config: &ClientConfig) -> Result<Self, CoordinatorError> {
        config.validate()?;
        info!("connecting to {}", config.server_label());
        let transport = TcpTransport::connect(&config.host, config.port, config.connect_timeout)?;
        Self::start(
            Box::new(transport),
            config.identity.clone(),
            config.poll_interval,
        )
    }

    /// Sends the `LOGIN` envelope over an open `transport` and spawns the
    /// transmit and receive loops.
    ///
    /// # Errors
    ///
    /// If `LOGIN` cannot be sent the transport is closed and the error
    /// returned.  If a worker thread cannot be spawned the partly started
    /// session is shut down before returning.
    pub fn start(
        mut transport: Box<dyn LineTransport>,
        identity: ClientIdentity,
        poll_interval: Duration,
    ) -> Result<Self, CoordinatorError> {
        let login = encode_message(&identity, LOGIN_BODY, ExtraFlag::NewConnection)?;
        if let Err(e) = transport.send_line(&login) {
            transport.close();
            return Err(e.into());
        }
        info!(
            name = identity.name(),
            group = identity.group_id(),
            "sent NEW_CONNECTION"
        );

        let shared = Arc::new(Shared {
            identity,
            poll_interval,
            transport: Mutex::new(transport),
            state: StateCell::new(),
            outbound: Arc::new(Mailbox::new("outbound")),
            inbound: Arc::new(Mailbox::new("inbound")),
            shutdown_requested: AtomicBool::new(false),
        });
        shared.state.advance(ConnectionState::Connected)?;

        let coordinator = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(2)),
        };
        coordinator.spawn_worker("chat-transmit", transmit_loop)?;
        coordinator.spawn_worker("chat-receive", receive_loop)?;
        Ok(coordinator)
    }

    /// Mailbox the terminal input feeds; every entry becomes one envelope.
    pub fn outbound(&self) -> Arc<Mailbox> {
        Arc::clone(&self.shared.outbound)
    }

    /// Mailbox of decoded `name: body` lines for the terminal output.
    pub fn inbound(&self) -> Arc<Mailbox> {
        Arc::clone(&self.shared.inbound)
    }

    /// Identity presented in every envelope.
    pub fn identity(&self) -> &ClientIdentity {
        &self.shared.identity
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// `true` while the session is live and the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.shared.lock_transport().is_connected()
    }

    /// Queues `text` for transmission.
    pub fn send(&self, text: impl Into<String>) {
        self.shared.outbound.enqueue(text);
    }

    /// Blocks until the session stops being `Connected` for any reason.
    pub fn wait_until_disconnected(&self) -> ConnectionState {
        self.shared
            .state
            .wait_until_reached(ConnectionState::ShuttingDown)
    }

    /// Like [`wait_until_disconnected`](Self::wait_until_disconnected) with an
    /// upper bound.  Returns `true` if the session ended.
    pub fn wait_until_disconnected_for(&self, timeout: Duration) -> bool {
        self.shared
            .state
            .wait_until_reached_for(ConnectionState::ShuttingDown, timeout)
    }

    /// Ends the session: flushes queued outbound lines, sends `LOGOUT`,
    /// closes the transport and joins both loops.
    ///
    /// Idempotent.  Never fails; a broken socket only produces log output.
    pub fn shutdown(&self) {
        if self.shared.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("shutdown requested");

        // Stop both loops before touching the socket so LOGOUT is the last
        // line written.
        if let Err(e) = self.shared.state.advance(ConnectionState::ShuttingDown) {
            debug!("shutdown after session already ended: {e}");
        }
        self.shared.outbound.close();
        self.join_workers();

        let pending = self.shared.encode_pending();
        {
            let mut transport = self.shared.lock_transport();
            if transport.is_connected() {
                for line in &pending {
                    if let Err(e) = transport.send_line(line) {
                        warn!("could not flush outbound message during shutdown: {e}");
                        break;
                    }
                }
                match encode_message(&self.shared.identity, LOGOUT_BODY, ExtraFlag::Shutdown) {
                    Ok(logout) => match transport.send_line(&logout) {
                        Ok(()) => info!("sent LOGOUT"),
                        Err(e) => warn!("could not send LOGOUT: {e}"),
                    },
                    Err(e) => error!("could not encode LOGOUT: {e}"),
                }
            } else {
                if !pending.is_empty() {
                    warn!("{} outbound messages not sent: connection closed", pending.len());
                }
                debug!("transport already closed; skipping LOGOUT");
            }
            transport.close();
        }

        if let Err(e) = self.shared.state.advance(ConnectionState::Closed) {
            debug!("state already closed: {e}");
        }
        self.shared.inbound.close();
        info!("session closed");
    }

    fn spawn_worker(
        &self,
        name: &'static str,
        body: fn(Arc<Shared>),
    ) -> Result<(), CoordinatorError> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(shared))
            .map_err(|source| CoordinatorError::Spawn { name, source })?;
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    fn join_workers(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("{name} thread panicked");
            }
        }
    }
}

impl Drop for ConnectionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn lock_transport(&self) -> MutexGuard<'_, Box<dyn LineTransport>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    /// Drains the outbound mailbox into encoded envelopes, dropping entries
    /// that cannot be framed.
    fn encode_pending(&self) -> Vec<String> {
        self.outbound
            .drain_all()
            .into_iter()
            .filter_map(
                |body| match encode_message(&self.identity, &body, ExtraFlag::None) {
                    Ok(line) => Some(line),
                    Err(e) => {
                        warn!("dropping outbound message: {e}");
                        None
                    }
                },
            )
            .collect()
    }

    /// Writes `lines` in order under the transport lock.
    fn transmit(&self, lines: &[String]) -> Result<(), TransportError> {
        let mut transport = self.lock_transport();
        for line in lines {
            transport.send_line(line)?;
            debug!(envelope = %line, "sent");
        }
        Ok(())
    }

    /// Reads the complete lines currently available, at most
    /// [`MAX_LINES_PER_TICK`] of them.
    ///
    /// Stops at a shutdown envelope, closing the transport before the lock is
    /// released; lines after it are left unread.
    fn read_available(&self) -> (Vec<String>, Option<SessionEnd>) {
        let mut lines = Vec::new();
        let mut transport = self.lock_transport();
        while lines.len() < MAX_LINES_PER_TICK {
            match transport.try_read_line() {
                Ok(Some(line)) if is_shutdown_signal(&line) => {
                    debug!(envelope = %line, "received shutdown signal");
                    transport.close();
                    return (lines, Some(SessionEnd::ServerShutdown));
                }
                Ok(Some(line)) => lines.push(line),
                Ok(None) => return (lines, None),
                Err(e) => return (lines, Some(SessionEnd::Lost(e))),
            }
        }
        (lines, None)
    }

    /// Decodes inbound lines into the inbound mailbox, dropping malformed ones.
    fn deliver(&self, lines: Vec<String>) {
        for line in lines {
            match decode_envelope(&line) {
                Ok(envelope) => {
                    if envelope.is_broadcast() {
                        debug!(sender = %envelope.client_name, "broadcast received");
                    }
                    self.inbound.enqueue(envelope.display_line());
                }
                Err(e) => warn!("dropping inbound line: {e}: {line:?}"),
            }
        }
    }

    /// Ends a session the server or the network has ended for us.
    fn end_session(&self, end: SessionEnd) {
        match end {
            SessionEnd::ServerShutdown => info!("server ended the session"),
            SessionEnd::Lost(e) if self.shutdown_requested.load(Ordering::SeqCst) => {
                debug!("transport error during shutdown ignored: {e}");
                return;
            }
            SessionEnd::Lost(e) => {
                error!("connection lost: {e}");
                self.lock_transport().close();
            }
        }
        if let Err(e) = self.state.advance(ConnectionState::ShuttingDown) {
            debug!("session already ending: {e}");
        }
        self.outbound.close();
    }
}

/// Sends queued outbound lines until the session leaves `Connected`.
fn transmit_loop(shared: Arc<Shared>) {
    debug!("transmit loop started");
    while shared.is_live() && !shared.outbound.is_closed() {
        if !shared.outbound.wait_for_data(shared.poll_interval) {
            continue;
        }
        // Entries left behind here are flushed by `shutdown`.
        if !shared.is_live() {
            break;
        }
        let lines = shared.encode_pending();
        if let Err(e) = shared.transmit(&lines) {
            shared.end_session(SessionEnd::Lost(e));
            break;
        }
    }
    debug!("transmit loop stopped");
}

/// Polls the transport once per interval until the session leaves `Connected`.
fn receive_loop(shared: Arc<Shared>) {
    debug!("receive loop started");
    loop {
        let state = shared
            .state
            .wait_while_in(ConnectionState::Connected, shared.poll_interval);
        if state != ConnectionState::Connected {
            break;
        }
        let (lines, end) = shared.read_available();
        shared.deliver(lines);
        if let Some(end) = end {
            shared.end_session(end);
            break;
        }
    }
    debug!("receive loop stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
