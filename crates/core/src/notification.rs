//! Notification model - a message for one user about something that
//! happened to one of their tasks.

use serde::{Deserialize, Serialize};
use crate::id::{NotificationId, UserId};
use crate::Time;

/// A notification delivered to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique identifier
    pub id: NotificationId,

    /// Recipient
    pub user_id: UserId,

    /// Human readable text
    pub message: String,

    /// Where the notification points to
    pub link: String,

    /// Whether the recipient has seen it
    #[serde(default)]
    pub read: bool,

    /// When it was created
    pub timestamp: Time,
}

impl Notification {
    /// Create an unread notification for `user_id`.
    pub fn new(user_id: UserId, message: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            message: message.into(),
            link: link.into(),
            read: false,
            timestamp: chrono::Utc::now(),
        }
    }
}
