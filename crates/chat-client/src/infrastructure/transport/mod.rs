//! Line transport abstraction.
//!
//! The coordinator never touches a socket directly.  It talks to a
//! [`LineTransport`], which moves whole text lines: the transport appends
//! the terminator on send and strips it on receive.
//!
//! - [`tcp::TcpTransport`] is the production implementation.
//! - [`mock::MockTransport`] records sent lines and replays scripted inbound
//!   lines for tests.

pub mod mock;
pub mod tcp;

use std::net::SocketAddr;

use thiserror::Error;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

/// Errors raised by a [`LineTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server host name could not be resolved.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    /// The host resolved to no usable address.
    #[error("{host} did not resolve to any address")]
    NoAddress { host: String },
    /// TCP connection to the server failed.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The transport has already been closed.
    #[error("transport is not connected")]
    NotConnected,
    /// Writing to the socket failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,
    /// The server sent more than `limit` bytes without a line terminator.
    #[error("inbound line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// A connection that exchanges text lines.
///
/// Implementations are used from one thread at a time; the coordinator
/// serialises access behind a single mutex.
pub trait LineTransport: Send {
    /// Writes `line` plus a line terminator and flushes immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] after [`close`](Self::close),
    /// or [`TransportError::Write`] if the stream is broken.  A failed write
    /// leaves the transport disconnected.
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Returns the next complete line without blocking.
    ///
    /// `Ok(None)` means no complete line is available yet.  Partial lines are
    /// kept until their terminator arrives.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] when the peer closed the connection,
    /// [`TransportError::Read`] on socket failure,
    /// [`TransportError::LineTooLong`] when a line outgrows the buffer limit,
    /// and
    /// [`TransportError::NotConnected`] after [`close`](Self::close).
    fn try_read_line(&mut self) -> Result<Option<String>, TransportError>;

    /// `true` until [`close`](Self::close) is called or the peer goes away.
    fn is_connected(&self) -> bool;

    /// Releases the connection.  Idempotent and never fails; secondary
    /// errors are logged.
    fn close(&mut self);
}
