//! Envelope types and protocol constants.
//!
//! Every envelope is a single line of `KEY:value` fields separated by `;`,
//! always in this order:
//!
//! ```text
//! VERSION_INFO:<version>;CLIENT_NAME:<name>;GROUP_ID:<group>;EXTRA:<extra>;MESSAGE:<body>
//! ```
//!
//! `MESSAGE` is always last and its value runs to the end of the line, so
//! the body is never split on `;`.

use std::fmt;

use crate::identity::ClientIdentity;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Protocol version carried in the `VERSION_INFO` field.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Separator between envelope fields.
pub const FIELD_DELIMITER: char = ';';

/// Separator between a field key and its value.
pub const KEY_VALUE_SEPARATOR: char = ':';

pub const VERSION_INFO_KEY: &str = "VERSION_INFO";
pub const CLIENT_NAME_KEY: &str = "CLIENT_NAME";
pub const GROUP_ID_KEY: &str = "GROUP_ID";
pub const EXTRA_KEY: &str = "EXTRA";
pub const MESSAGE_KEY: &str = "MESSAGE";

/// Group id used by the server for messages addressed to every client.
///
/// Clients never originate envelopes with this group.
pub const BROADCAST_GROUP: &str = "BROADCAST";

/// Body of the envelope sent right after connecting.
pub const LOGIN_BODY: &str = "LOGIN";

/// Body of the envelope sent while shutting down.
pub const LOGOUT_BODY: &str = "LOGOUT";

// ── Extra flag ────────────────────────────────────────────────────────────────

/// Session-lifecycle marker carried in the `EXTRA` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraFlag {
    /// Ordinary chat content (`EXTRA:` with an empty value).
    #[default]
    None,
    /// First envelope of a new connection.
    NewConnection,
    /// The sender is shutting down; no further envelopes follow.
    Shutdown,
}

impl ExtraFlag {
    /// Returns the value written after `EXTRA:` on the wire.
    pub fn as_wire(self) -> &'static str {
        match self {
            ExtraFlag::None => "",
            ExtraFlag::NewConnection => "NEW_CONNECTION",
            ExtraFlag::Shutdown => "SHUTDOWN",
        }
    }
}

impl TryFrom<&str> for ExtraFlag {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, ()> {
        match value {
            "" => Ok(ExtraFlag::None),
            "NEW_CONNECTION" => Ok(ExtraFlag::NewConnection),
            "SHUTDOWN" => Ok(ExtraFlag::Shutdown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ExtraFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ── Wire message ──────────────────────────────────────────────────────────────

/// In-memory form of one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Protocol version of the sender.
    pub version_info: String,
    /// Display name of the sender.
    pub client_name: String,
    /// Group the envelope is addressed to (or [`BROADCAST_GROUP`]).
    pub group_id: String,
    /// Lifecycle marker.
    pub extra: ExtraFlag,
    /// Chat text.  Never contains a line terminator.
    pub body: String,
}

impl WireMessage {
    /// Builds an outbound envelope for `identity` at the current protocol version.
    pub fn outbound(identity: &ClientIdentity, body: impl Into<String>, extra: ExtraFlag) -> Self {
        Self {
            version_info: PROTOCOL_VERSION.to_string(),
            client_name: identity.name().to_string(),
            group_id: identity.group_id().to_string(),
            extra,
            body: body.into(),
        }
    }

    /// Returns `true` when the server addressed this envelope to every client.
    pub fn is_broadcast(&self) -> bool {
        self.group_id == BROADCAST_GROUP
    }

    /// Formats the envelope the way it is printed on the terminal: `name: body`.
    pub fn display_line(&self) -> String {
        format!("{}: {}", self.client_name, self.body)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
