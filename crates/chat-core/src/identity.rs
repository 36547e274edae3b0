//! Client identity: the `(name, group)` label attached to every envelope.
//!
//! The identity is built once at startup from configuration and then shared
//! read-only with the codec and the connection coordinator.  There is no
//! process-wide mutable copy of it.

use thiserror::Error;

use crate::protocol::messages::{BROADCAST_GROUP, FIELD_DELIMITER};

/// Errors raised when an identity would produce an unparseable envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The client name is empty.
    #[error("client name must not be empty")]
    EmptyName,

    /// The group id is empty.
    #[error("group id must not be empty")]
    EmptyGroup,

    /// A field contains a character that would break envelope framing.
    #[error("{field} contains forbidden character {ch:?}")]
    ForbiddenCharacter { field: &'static str, ch: char },

    /// The group id is reserved for server-originated messages.
    #[error("group id {0:?} is reserved for the server")]
    ReservedGroup(String),
}

/// Name and group under which this client talks to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    name: String,
    group_id: String,
}

impl ClientIdentity {
    /// Validates and builds an identity.
    ///
    /// Neither field may be empty or contain `;`, `\n` or `\r`, and the group
    /// may not be the server-only `BROADCAST` group.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] describing the first violated rule.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chat_core::ClientIdentity;
    ///
    /// let id = ClientIdentity::new("Adam", "Group123").unwrap();
    /// assert_eq!(id.name(), "Adam");
    /// assert!(ClientIdentity::new("Adam", "BROADCAST").is_err());
    /// ```
    pub fn new(name: impl Into<String>, group_id: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        let group_id = group_id.into();

        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if group_id.is_empty() {
            return Err(IdentityError::EmptyGroup);
        }
        check_field("client name", &name)?;
        check_field("group id", &group_id)?;
        if group_id == BROADCAST_GROUP {
            return Err(IdentityError::ReservedGroup(group_id));
        }

        Ok(Self { name, group_id })
    }

    /// Display name sent in `CLIENT_NAME`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group sent in `GROUP_ID`.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), IdentityError> {
    match value
        .chars()
        .find(|&c| c == FIELD_DELIMITER || c == '\n' || c == '\r')
    {
        Some(ch) => Err(IdentityError::ForbiddenCharacter { field, ch }),
        None => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
