//! chat-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does chat-client do?
//!
//! The client opens one TCP connection to a chat server and keeps four
//! loops running side by side:
//!
//! 1. **Terminal input** reads operator lines and queues them in the
//!    *outbound* mailbox.
//! 2. **Transmit** drains the outbound mailbox, wraps each line in an
//!    envelope carrying the client's name and group, and writes it to the
//!    socket.
//! 3. **Receive** polls the socket, decodes every inbound envelope into a
//!    `name: body` line, and queues it in the *inbound* mailbox.  A shutdown
//!    envelope from the server ends the session instead.
//! 4. **Terminal output** prints whatever arrives in the inbound mailbox.
//!
//! Transmit and receive are owned by the
//! [`ConnectionCoordinator`](application::coordinator::ConnectionCoordinator),
//! which also performs the `LOGIN`/`LOGOUT` handshake.

/// Application layer: connection state machine and coordinator.
pub mod application;

/// Runtime configuration assembled from the command line.
pub mod config;

/// Infrastructure layer: TCP transport and terminal adapters.
pub mod infrastructure;
