//! Notification center, mirrored to the `notifications` key.

use helpboard_core::{Notification, NotificationId, SessionId, UserId};
use helpboard_storage::{keys, load_json, save_json, SharedStorage, Storage, StorageError};
use tracing::{debug, warn};
use crate::error::Result;

/// Notifications for every user, newest first.
pub struct NotificationCenter<S: Storage> {
    storage: SharedStorage<S>,
    session: SessionId,
    notifications: Vec<Notification>,
}

impl<S: Storage> NotificationCenter<S> {
    /// Load notifications from storage. Missing or unreadable data starts empty.
    pub async fn load(storage: SharedStorage<S>, session: SessionId) -> Result<Self> {
        let mut center = Self {
            storage,
            session,
            notifications: Vec::new(),
        };
        center.reload().await?;
        Ok(center)
    }

    /// Re-read notifications from storage.
    pub async fn reload(&mut self) -> Result<()> {
        let loaded = {
            let storage = self.storage.lock().await;
            load_json::<_, Vec<Notification>>(&*storage, keys::NOTIFICATIONS).await
        };
        self.notifications = match loaded {
            Ok(list) => list.unwrap_or_default(),
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "stored notifications are unreadable, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let mut storage = self.storage.lock().await;
        save_json(&mut *storage, &self.session, keys::NOTIFICATIONS, &self.notifications).await?;
        Ok(())
    }

    /// Deliver a new unread notification to `user`.
    pub async fn add(
        &mut self,
        user: &UserId,
        message: impl Into<String>,
        link: impl Into<String>,
    ) -> Result<Notification> {
        let notification = Notification::new(user.clone(), message, link);
        self.notifications.insert(0, notification.clone());
        self.persist().await?;
        debug!(user = %user, notification = %notification.id, "notification added");
        Ok(notification)
    }

    /// Every notification, newest first.
    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    /// Look up a notification.
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| &n.id == id)
    }

    /// Flip the read flag. Returns false if there is no such notification.
    pub async fn mark_as_read(&mut self, id: &NotificationId) -> Result<bool> {
        let Some(notification) = self.notifications.iter_mut().find(|n| &n.id == id) else {
            return Ok(false);
        };
        if !notification.read {
            notification.read = true;
            self.persist().await?;
        }
        Ok(true)
    }

    /// Notifications addressed to `user`, newest first.
    pub fn for_user(&self, user: &UserId) -> impl Iterator<Item = &Notification> + '_ {
        let user = user.clone();
        self.notifications.iter().filter(move |n| n.user_id == user)
    }

    /// Number of unread notifications addressed to `user`.
    pub fn unread_count(&self, user: &UserId) -> usize {
        self.for_user(user).filter(|n| !n.read).count()
    }

    /// Replace the list with a value written by another session.
    pub fn apply_remote(&mut self, raw: &str) -> bool {
        match serde_json::from_str(raw) {
            Ok(list) => {
                self.notifications = list;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable notifications update");
                false
            }
        }
    }
}
