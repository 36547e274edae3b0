//! Protocol module containing the envelope types and the line codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_envelope, decode_message, encode_envelope, encode_message, is_shutdown_signal,
    ProtocolError,
};
pub use messages::*;
