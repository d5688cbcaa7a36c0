//! Helpboard core data models.
//!
//! This crate defines the records shared by every Helpboard component:
//! users, tasks with their message threads, notifications and the
//! catalogue of services a task can be posted under.

#![warn(missing_docs)]

// Core identities
mod id;

// People
mod user;

// Tasks and their conversations
mod task;
mod notification;

// Static reference data
mod catalog;

// Re-exports
pub use id::*;

pub use user::{Availability, User, UserPatch, MAX_RATING, weekday_name};
pub use task::{
    Message, PaymentMethod, Task, TaskDraft, TaskPatch, TaskStatus, ValidationError,
    VIDEO_CALL_PREFIX,
};
pub use notification::Notification;
pub use catalog::{Service, OTHER_SERVICE, SERVICES, is_known_service_type, suggested_budget};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

/// Calendar day a task is scheduled on
pub type Day = chrono::NaiveDate;
