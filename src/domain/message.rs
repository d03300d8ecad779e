use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
}

impl MessageStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown message status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for MessageStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "read" => Ok(Self::Read),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("Text is required")]
    Empty,
    #[error("Text must be at most {max} characters")]
    TooLong { max: usize },
}

/// Message text that has passed submission validation.
///
/// Blank text is rejected by comparing the trimmed value against the empty string, so
/// inputs like `"0"` are accepted. Submitted text is kept as-is, surrounding whitespace
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageText(String);

impl MessageText {
    /// Validates raw submitted text.
    ///
    /// # Errors
    /// Returns `TextError::Empty` for blank text and `TextError::TooLong` when the text has
    /// more than `max_len` characters.
    pub fn parse(raw: String, max_len: usize) -> Result<Self, TextError> {
        if raw.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if raw.chars().count() > max_len {
            return Err(TextError::TooLong { max: max_len });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A queued request to persist one message.
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub(crate) text: MessageText,
}

impl SendMessage {
    #[must_use]
    pub const fn new(text: MessageText) -> Self {
        Self { text }
    }

    #[must_use]
    pub const fn text(&self) -> &MessageText {
        &self.text
    }
}

/// A fully constructed message that has not been stored yet.
///
/// Identity and creation time are fixed here; retries must reuse the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub(crate) uuid: Uuid,
    pub(crate) text: String,
    pub(crate) status: MessageStatus,
    pub(crate) created_at: OffsetDateTime,
}

impl NewMessage {
    #[must_use]
    pub fn new(text: MessageText, created_at: OffsetDateTime) -> Self {
        Self { uuid: Uuid::now_v7(), text: text.into_inner(), status: MessageStatus::Sent, created_at }
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    #[must_use]
    pub const fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

/// A stored message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub(crate) id: i64,
    pub(crate) uuid: Uuid,
    pub(crate) text: String,
    pub(crate) status: MessageStatus,
    pub(crate) created_at: OffsetDateTime,
}

impl Message {
    /// Attaches the store-assigned surrogate id to a constructed message.
    #[must_use]
    pub fn from_new(id: i64, message: NewMessage) -> Self {
        Self { id, uuid: message.uuid, text: message.text, status: message.status, created_at: message.created_at }
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    #[must_use]
    pub const fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}
