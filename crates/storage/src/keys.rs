//! Well-known storage keys.

/// Id of the user the session acts as.
pub const CURRENT_USER_ID: &str = "currentUserId";

/// Map of user id to user record.
pub const USERS: &str = "users";

/// Ordered list of active tasks, newest first.
pub const TASKS: &str = "tasks";

/// Ordered list of notifications, newest first.
pub const NOTIFICATIONS: &str = "notifications";

/// Whether `key` is safe to use as a storage key.
///
/// Keys end up as file names, so only ASCII letters, digits, `-` and `_`
/// are accepted.
pub fn is_valid(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
