//! # chat-core
//!
//! Shared library for the line chat client containing the wire protocol
//! codec, the client identity value, and the thread-safe mailbox queue.
//!
//! It has no dependencies on sockets, terminals, or a runtime; the
//! `chat-client` crate wires these pieces to a TCP connection.
//!
//! # Architecture overview
//!
//! The client talks to a chat server over a single TCP connection.  Every
//! message travels as one text line (an *envelope*):
//!
//! ```text
//! VERSION_INFO:1.0.0;CLIENT_NAME:Adam;GROUP_ID:G1;EXTRA:;MESSAGE:hello
//! ```
//!
//! - **`protocol`** – How envelopes are built and taken apart.  The codec
//!   turns a [`ClientIdentity`] plus a body into a line, decodes inbound
//!   lines into `(sender, body)`, and recognises the in-band shutdown signal.
//!
//! - **`identity`** – The `(name, group)` label a client presents to the
//!   server.  Validated once at startup and immutable afterwards.
//!
//! - **`mailbox`** – A FIFO of text lines shared between a producer thread
//!   and a consumer thread, with a bounded blocking wait.

pub mod identity;
pub mod mailbox;
pub mod protocol;

pub use identity::{ClientIdentity, IdentityError};
pub use mailbox::Mailbox;
pub use protocol::codec::{
    decode_envelope, decode_message, encode_envelope, encode_message, is_shutdown_signal,
    ProtocolError,
};
pub use protocol::messages::{ExtraFlag, WireMessage};
