//! Message identifier and parsed email record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields extracted from a single Gmail message.
///
/// Missing headers and a missing plain text part are represented as empty
/// strings rather than `None`, since every field ends up in a spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Gmail message ID
    pub id: MessageId,
    /// Raw `From` header
    pub sender: String,
    /// Raw `Subject` header
    pub subject: String,
    /// `Date` header normalized to `YYYY-MM-DD HH:MM:SS+HH:MM`
    pub date: String,
    /// Decoded first text/plain part
    pub body: String,
}
