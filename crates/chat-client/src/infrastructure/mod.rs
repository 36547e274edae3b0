//! Infrastructure layer for the client application.
//!
//! Contains the OS-facing adapters: the TCP line transport and the terminal
//! input/output loops.
//!
//! **Dependency rule**: this layer may depend on `chat_core`; the
//! `application` layer only sees it through the
//! [`LineTransport`](transport::LineTransport) trait and the mailboxes.
//!
//! # Sub-modules
//!
//! - **`transport`** – Line-oriented socket access: blocking connect, flushed
//!   line writes, non-blocking line reads, idempotent close.  A recording
//!   `MockTransport` is also provided for tests.
//!
//! - **`terminal`** – The stdin reader and stdout writer threads that feed
//!   and drain the coordinator's mailboxes.

pub mod terminal;
pub mod transport;
