//! Line codec for encoding and decoding chat envelopes.
//!
//! Wire format (one line per envelope):
//! ```text
//! VERSION_INFO:<version>;CLIENT_NAME:<name>;GROUP_ID:<group>;EXTRA:<extra>;MESSAGE:<body>
//! ```
//! The line terminator is added and stripped by the transport, not here.
//!
//! # Parsing
//!
//! Decoding does not search the line for markers.  The line is walked field
//! by field: each header field is split on the first `:` into a key/value
//! pair, and as soon as a field starts with `MESSAGE:` everything that
//! remains on the line is taken as the body.  This is why a body may itself
//! contain `;` or even `MESSAGE:` without confusing the decoder, and why a
//! shutdown marker inside a body is never mistaken for a real one.
//!
//! Bodies may not contain `\n` or `\r`; there is no escaping scheme, so
//! [`encode_message`] rejects them instead.

use thiserror::Error;

use crate::identity::ClientIdentity;
use crate::protocol::messages::{
    ExtraFlag, WireMessage, CLIENT_NAME_KEY, EXTRA_KEY, FIELD_DELIMITER, GROUP_ID_KEY,
    KEY_VALUE_SEPARATOR, MESSAGE_KEY, VERSION_INFO_KEY,
};

/// Errors that can occur during envelope encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A required field is absent from an inbound line.
    #[error("malformed line: missing {0} field")]
    MissingField(&'static str),

    /// The `EXTRA` field holds a value this client does not know.
    #[error("malformed line: unknown EXTRA value {0:?}")]
    UnknownExtra(String),

    /// An outbound body contains a line terminator.
    #[error("message body must not contain a line break")]
    LineBreakInBody,

    /// An outbound header value would break framing.
    #[error("{0} value contains a delimiter or line break")]
    InvalidHeaderValue(&'static str),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `body` from `identity` into one envelope line (without terminator).
///
/// # Errors
///
/// Returns [`ProtocolError::LineBreakInBody`] if `body` contains `\n` or `\r`.
///
/// # Examples
///
/// ```rust
/// use chat_core::{decode_message, encode_message, ClientIdentity, ExtraFlag};
///
/// let id = ClientIdentity::new("Adam", "Group123").unwrap();
/// let line = encode_message(&id, "hello", ExtraFlag::None).unwrap();
/// assert_eq!(
///     line,
///     "VERSION_INFO:1.0.0;CLIENT_NAME:Adam;GROUP_ID:Group123;EXTRA:;MESSAGE:hello"
/// );
/// assert_eq!(decode_message(&line).unwrap(), ("Adam".to_string(), "hello".to_string()));
/// ```
pub fn encode_message(
    identity: &ClientIdentity,
    body: &str,
    extra: ExtraFlag,
) -> Result<String, ProtocolError> {
    encode_envelope(&WireMessage::outbound(identity, body, extra))
}

/// Encodes a fully populated [`WireMessage`].
///
/// # Errors
///
/// Returns [`ProtocolError`] if the body contains a line break or a header
/// value contains `;` or a line break.
pub fn encode_envelope(msg: &WireMessage) -> Result<String, ProtocolError> {
    if msg.body.contains(['\n', '\r']) {
        return Err(ProtocolError::LineBreakInBody);
    }
    check_header_value(VERSION_INFO_KEY, &msg.version_info)?;
    check_header_value(CLIENT_NAME_KEY, &msg.client_name)?;
    check_header_value(GROUP_ID_KEY, &msg.group_id)?;

    let mut line = String::with_capacity(
        64 + msg.version_info.len() + msg.client_name.len() + msg.group_id.len() + msg.body.len(),
    );
    push_field(&mut line, VERSION_INFO_KEY, &msg.version_info);
    push_field(&mut line, CLIENT_NAME_KEY, &msg.client_name);
    push_field(&mut line, GROUP_ID_KEY, &msg.group_id);
    push_field(&mut line, EXTRA_KEY, msg.extra.as_wire());
    line.push_str(MESSAGE_KEY);
    line.push(KEY_VALUE_SEPARATOR);
    line.push_str(&msg.body);
    Ok(line)
}

/// Decodes an inbound line into `(sender name, body)`.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingField`] if the line has no `CLIENT_NAME`
/// or no `MESSAGE` field.
pub fn decode_message(line: &str) -> Result<(String, String), ProtocolError> {
    let parsed = ParsedLine::parse(line);
    let name = parsed
        .field(CLIENT_NAME_KEY)
        .ok_or(ProtocolError::MissingField(CLIENT_NAME_KEY))?;
    let body = parsed.body.ok_or(ProtocolError::MissingField(MESSAGE_KEY))?;
    Ok((name.to_string(), body.to_string()))
}

/// Decodes an inbound line into every [`WireMessage`] field.
///
/// `VERSION_INFO` and `GROUP_ID` default to empty strings and a missing
/// `EXTRA` field means [`ExtraFlag::None`].
///
/// # Errors
///
/// Returns [`ProtocolError::MissingField`] like [`decode_message`], and
/// [`ProtocolError::UnknownExtra`] for an unrecognised `EXTRA` value.
pub fn decode_envelope(line: &str) -> Result<WireMessage, ProtocolError> {
    let parsed = ParsedLine::parse(line);
    let client_name = parsed
        .field(CLIENT_NAME_KEY)
        .ok_or(ProtocolError::MissingField(CLIENT_NAME_KEY))?;
    let body = parsed.body.ok_or(ProtocolError::MissingField(MESSAGE_KEY))?;
    let extra = match parsed.field(EXTRA_KEY) {
        Some(raw) => {
            ExtraFlag::try_from(raw).map_err(|_| ProtocolError::UnknownExtra(raw.to_string()))?
        }
        None => ExtraFlag::None,
    };

    Ok(WireMessage {
        version_info: parsed.field(VERSION_INFO_KEY).unwrap_or_default().to_string(),
        client_name: client_name.to_string(),
        group_id: parsed.field(GROUP_ID_KEY).unwrap_or_default().to_string(),
        extra,
        body: body.to_string(),
    })
}

/// Returns `true` iff `EXTRA:SHUTDOWN` appears as a header field before the
/// `MESSAGE` field.
///
/// A line without a `MESSAGE` field is never a shutdown signal, and a
/// shutdown marker inside the body does not count.
///
/// ```rust
/// use chat_core::is_shutdown_signal;
///
/// assert!(is_shutdown_signal("CLIENT_NAME:server;EXTRA:SHUTDOWN;MESSAGE:bye"));
/// assert!(!is_shutdown_signal("CLIENT_NAME:eve;EXTRA:;MESSAGE:EXTRA:SHUTDOWN;"));
/// ```
pub fn is_shutdown_signal(line: &str) -> bool {
    let parsed = ParsedLine::parse(line);
    parsed.body.is_some()
        && parsed
            .header
            .iter()
            .any(|&(key, value)| key == EXTRA_KEY && value == ExtraFlag::Shutdown.as_wire())
}

// ── Line parsing ──────────────────────────────────────────────────────────────

/// Header fields in wire order plus the verbatim body, if present.
struct ParsedLine<'a> {
    header: Vec<(&'a str, &'a str)>,
    body: Option<&'a str>,
}

impl<'a> ParsedLine<'a> {
    fn parse(line: &'a str) -> Self {
        let mut rest = line.trim_end_matches(['\n', '\r']);
        let mut header = Vec::with_capacity(4);

        loop {
            if let Some((key, value)) = rest.split_once(KEY_VALUE_SEPARATOR) {
                if key == MESSAGE_KEY {
                    return Self {
                        header,
                        body: Some(value),
                    };
                }
            }
            match rest.split_once(FIELD_DELIMITER) {
                Some((field, tail)) => {
                    header.push(split_field(field));
                    rest = tail;
                }
                None => {
                    if !rest.is_empty() {
                        header.push(split_field(rest));
                    }
                    return Self { header, body: None };
                }
            }
        }
    }

    /// Value of the first header field named `key`.
    fn field(&self, key: &str) -> Option<&'a str> {
        self.header
            .iter()
            .find(|&&(k, _)| k == key)
            .map(|&(_, value)| value)
    }
}

/// Splits `KEY:value`; a field without a separator is a key with an empty value.
fn split_field(field: &str) -> (&str, &str) {
    field.split_once(KEY_VALUE_SEPARATOR).unwrap_or((field, ""))
}

fn push_field(line: &mut String, key: &str, value: &str) {
    line.push_str(key);
    line.push(KEY_VALUE_SEPARATOR);
    line.push_str(value);
    line.push(FIELD_DELIMITER);
}

fn check_header_value(key: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.contains([FIELD_DELIMITER, '\n', '\r']) {
        return Err(ProtocolError::InvalidHeaderValue(key));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
