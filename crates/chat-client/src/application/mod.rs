//! Application layer for the client.
//!
//! - **`state`** – The forward-only connection state machine
//!   (`Connecting → Connected → ShuttingDown → Closed`) with a condition
//!   variable so loops can sleep until the state changes.
//!
//! - **`coordinator`** – Owns the transport and both mailboxes, runs the
//!   transmit and receive loops on their own threads, and performs the
//!   `LOGIN`/`LOGOUT` handshake.

pub mod coordinator;
pub mod state;
