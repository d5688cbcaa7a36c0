//! Unique identifiers for Helpboard entities.
//!
//! Identifiers are plain strings: seeded records carry short readable ids
//! (`elder1`, `msg1`) while generated ones are a prefix plus a ULID
//! (`task-01J0...`).

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new unique id.
            pub fn generate() -> Self {
                Self(format!(concat!($prefix, "-{}"), Ulid::new()))
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a User
    UserId, "user"
);

string_id!(
    /// Unique identifier for a Task
    TaskId, "task"
);

string_id!(
    /// Unique identifier for a chat Message
    MessageId, "msg"
);

string_id!(
    /// Unique identifier for a Notification
    NotificationId, "notif"
);

string_id!(
    /// Identifier of one client session sharing a storage backend.
    ///
    /// Writes are tagged with the session that made them so a session can
    /// tell its own changes apart from changes made elsewhere.
    SessionId, "session"
);
