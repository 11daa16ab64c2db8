//! Conversation message identifier.
//!
//! Ids minted by this crate use the TypeID format (`msg_01h455vb4pex5vsknk084sn02q`),
//! which is time-sortable. Messages created by the caller may carry any
//! non-blank identifier the caller's store already uses.

use mti::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of a conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

/// Error returned when attempting to create an invalid message ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMessageId {
    /// The identifier was empty or only whitespace
    Blank,
    /// The identifier contained a control character
    ControlCharacter {
        /// Byte offset of the offending character
        position: usize,
    },
}

impl fmt::Display for InvalidMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "message ID must not be blank"),
            Self::ControlCharacter { position } => {
                write!(f, "message ID contains a control character at byte {position}")
            }
        }
    }
}

impl std::error::Error for InvalidMessageId {}

impl MessageId {
    /// The TypeID prefix for identifiers minted by this crate.
    pub const PREFIX: &'static str = "msg";

    /// Mints a fresh, time-sortable message ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>().to_string())
    }

    /// Accepts a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMessageId::Blank` for empty or whitespace-only input and
    /// `InvalidMessageId::ControlCharacter` if the id contains control characters.
    pub fn parse(s: &str) -> Result<Self, InvalidMessageId> {
        if s.trim().is_empty() {
            return Err(InvalidMessageId::Blank);
        }
        if let Some((position, _)) = s.char_indices().find(|(_, c)| c.is_control()) {
            return Err(InvalidMessageId::ControlCharacter { position });
        }
        Ok(Self(s.to_string()))
    }

    /// Returns true if this id was minted by this crate.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.0
            .strip_prefix(Self::PREFIX)
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageId {
    type Err = InvalidMessageId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
