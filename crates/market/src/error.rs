//! Marketplace error taxonomy.

use helpboard_core::{NotificationId, TaskId, UserId, ValidationError};
use helpboard_storage::StorageError;

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Errors returned by the directory, the task store and the marketplace.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// No user is logged in
    #[error("You must be logged in to {0}")]
    NotAuthenticated(&'static str),

    /// Logged in, but not allowed to do this
    #[error("Not allowed to {action}: {reason}")]
    NotAuthorized {
        /// What was attempted
        action: &'static str,
        /// Why it was refused
        reason: String,
    },

    /// Task does not exist (or no longer exists)
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// User does not exist
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Notification does not exist
    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// Lifecycle transition not allowed from the current state
    #[error("Cannot {action} task {task}: {reason}")]
    InvalidTransition {
        /// Task the transition was attempted on
        task: TaskId,
        /// Attempted transition
        action: &'static str,
        /// Why it is not allowed
        reason: String,
    },

    /// App-paid task has not been paid yet
    #[error("Payment required before assigning a helper to task {0}")]
    PaymentRequired(TaskId),

    /// Rating outside 1..=5
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    /// Input failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MarketError {
    pub(crate) fn not_authorized(action: &'static str, reason: impl Into<String>) -> Self {
        Self::NotAuthorized {
            action,
            reason: reason.into(),
        }
    }

    pub(crate) fn transition(
        task: &TaskId,
        action: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            task: task.clone(),
            action,
            reason: reason.into(),
        }
    }
}
