//! Notification message types.
//!
//! Defines the user identity and the JSON payload pushed to connected clients.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Global message ID counter.
static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique message ID.
#[must_use]
pub fn next_message_id() -> u64 {
    MESSAGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Identity of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(NonZeroU64);

impl UserId {
    /// Creates a user ID, returning `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for UserId {
    fn from(id: NonZeroU64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A notification pushed to every session of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: u64,

    /// Message body.
    pub message: String,

    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,

    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a message with an id and body.
    #[must_use]
    pub fn new(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            title: None,
            priority: None,
            date: None,
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

/// Body of a message creation request.
///
/// A missing `message` deserializes as empty and is rejected by
/// [`Validate`], so both cases report the field as required.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMessage {
    /// Message body.
    #[serde(default)]
    #[validate(length(min = 1, code = "required"))]
    pub message: String,

    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,

    /// Optional priority.
    #[serde(default)]
    pub priority: Option<u8>,
}

impl NewMessage {
    /// Stamps the request with a fresh id and the current time.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            id: next_message_id(),
            message: self.message,
            title: self.title,
            priority: self.priority,
            date: Some(Utc::now()),
        }
    }
}
