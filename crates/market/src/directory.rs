//! User directory: known users plus the identity the session acts as.

use std::collections::BTreeMap;
use helpboard_core::{Availability, SessionId, User, UserId, UserPatch};
use helpboard_storage::{keys, load_json, save_json, SharedStorage, Storage, StorageError};
use tracing::{debug, info, warn};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::seed;

/// Description given to students created through login.
const NEW_STUDENT_DESCRIPTION: &str = "New student ready to help!";

/// Name given to users created through login without one.
const DEFAULT_NAME: &str = "New User";

/// Directory of users, mirrored to the `users` and `currentUserId` keys.
pub struct UserDirectory<S: Storage> {
    storage: SharedStorage<S>,
    session: SessionId,
    users: BTreeMap<UserId, User>,
    current: Option<UserId>,
    default_user: UserId,
    demo_pair: (UserId, UserId),
    seed: bool,
}

impl<S: Storage> UserDirectory<S> {
    /// Load the directory from storage, seeding it when it is missing or
    /// unreadable.
    pub async fn load(
        storage: SharedStorage<S>,
        session: SessionId,
        config: &MarketConfig,
    ) -> Result<Self> {
        let mut directory = Self {
            storage,
            session,
            users: BTreeMap::new(),
            current: None,
            default_user: config.default_user.clone(),
            demo_pair: (config.demo_elder.clone(), config.demo_student.clone()),
            seed: config.seed_demo_data,
        };
        directory.reload().await?;
        Ok(directory)
    }

    /// Re-read both keys from storage.
    pub async fn reload(&mut self) -> Result<()> {
        self.reload_users().await?;

        let current = {
            let storage = self.storage.lock().await;
            load_json::<_, UserId>(&*storage, keys::CURRENT_USER_ID).await
        };
        let current = match current {
            Ok(current) => current,
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "stored current user is unreadable");
                None
            }
            Err(e) => return Err(e.into()),
        };
        match current.filter(|id| self.users.contains_key(id)) {
            Some(id) => self.current = Some(id),
            None => self.reset_to_default().await?,
        }
        Ok(())
    }

    /// Re-read the user map only, keeping this session's identity.
    pub async fn reload_users(&mut self) -> Result<()> {
        let users = {
            let storage = self.storage.lock().await;
            load_json::<_, BTreeMap<UserId, User>>(&*storage, keys::USERS).await
        };

        match users {
            Ok(Some(users)) => self.users = users,
            Ok(None) => {
                self.users = self.seed_users();
                self.persist_users().await?;
            }
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "stored users are unreadable, falling back to seed data");
                self.users = self.seed_users();
                self.persist_users().await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn seed_users(&self) -> BTreeMap<UserId, User> {
        if self.seed { seed::users() } else { BTreeMap::new() }
    }

    async fn persist_users(&self) -> Result<()> {
        let mut storage = self.storage.lock().await;
        save_json(&mut *storage, &self.session, keys::USERS, &self.users).await?;
        debug!(count = self.users.len(), "persisted users");
        Ok(())
    }

    async fn persist_current(&self) -> Result<()> {
        let mut storage = self.storage.lock().await;
        match &self.current {
            Some(id) => save_json(&mut *storage, &self.session, keys::CURRENT_USER_ID, id).await?,
            None => storage.remove(&self.session, keys::CURRENT_USER_ID).await?,
        }
        Ok(())
    }

    async fn reset_to_default(&mut self) -> Result<()> {
        self.current = self
            .users
            .contains_key(&self.default_user)
            .then(|| self.default_user.clone());
        self.persist_current().await
    }

    /// User the session currently acts as.
    pub fn current(&self) -> Option<&User> {
        self.current.as_ref().and_then(|id| self.users.get(id))
    }

    /// Look up a user by id.
    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Look up a user by email.
    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    /// Every known user, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Every known student, ordered by id.
    pub fn students(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|u| u.is_student)
    }

    /// Log in as the user with `email`, creating one if nobody has it.
    ///
    /// New users are students when the email mentions "student". New
    /// students start unrated with the demo student's availability.
    pub async fn login(&mut self, email: &str, name: Option<&str>) -> Result<User> {
        let user = match self.find_by_email(email) {
            Some(existing) => existing.clone(),
            None => {
                let user = self.fabricate(email, name);
                info!(user = %user.id, is_student = user.is_student, "created user on login");
                self.users.insert(user.id.clone(), user.clone());
                self.persist_users().await?;
                user
            }
        };

        self.current = Some(user.id.clone());
        self.persist_current().await?;
        info!(user = %user.id, "logged in");
        Ok(user)
    }

    fn fabricate(&self, email: &str, name: Option<&str>) -> User {
        let email = email.trim().to_string();
        let is_student = email.contains("student");
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAME)
            .to_string();

        let mut user = User {
            id: UserId::generate(),
            email,
            name,
            is_student,
            description: None,
            rating: None,
            rating_count: None,
            availability: None,
        };
        if is_student {
            user.description = Some(NEW_STUDENT_DESCRIPTION.to_string());
            user.rating = Some(0.0);
            user.rating_count = Some(0);
            user.availability = Some(
                self.users
                    .get(&self.demo_pair.1)
                    .and_then(|u| u.availability.clone())
                    .unwrap_or_else(Availability::always),
            );
        }
        user
    }

    /// Go back to the default identity.
    pub async fn logout(&mut self) -> Result<Option<User>> {
        self.reset_to_default().await?;
        info!(user = ?self.current, "logged out");
        Ok(self.current().cloned())
    }

    /// Toggle between the demo elder and the demo student.
    ///
    /// Does nothing if either demo identity is missing.
    pub async fn switch_user(&mut self) -> Result<Option<User>> {
        let (elder, student) = &self.demo_pair;
        if !self.users.contains_key(elder) || !self.users.contains_key(student) {
            return Ok(self.current().cloned());
        }

        let next = if self.current.as_ref() == Some(elder) {
            student.clone()
        } else {
            elder.clone()
        };
        self.current = Some(next);
        self.persist_current().await?;
        info!(user = ?self.current, "switched user");
        Ok(self.current().cloned())
    }

    /// Merge `patch` into the user with `id`.
    ///
    /// The current-user view follows automatically since it is resolved by id.
    pub async fn update_user(&mut self, id: &UserId, patch: UserPatch) -> Result<User> {
        let user = self
            .users
            .get_mut(id)
            .ok_or_else(|| MarketError::UserNotFound(id.clone()))?;
        user.apply(patch);
        let updated = user.clone();
        self.persist_users().await?;
        debug!(user = %id, "updated user");
        Ok(updated)
    }

    /// Fold one more `rating` into the helper's running average.
    pub async fn record_rating(&mut self, id: &UserId, rating: u8) -> Result<User> {
        let patch = self
            .users
            .get(id)
            .ok_or_else(|| MarketError::UserNotFound(id.clone()))?
            .rating_update(rating);
        self.update_user(id, patch).await
    }

    /// Replace the user map with a value written by another session.
    ///
    /// Returns false (and keeps the current snapshot) if the value does not
    /// parse. The current-user pointer is per session and is not touched.
    pub fn apply_remote(&mut self, raw: &str) -> bool {
        match serde_json::from_str(raw) {
            Ok(users) => {
                self.users = users;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable users update");
                false
            }
        }
    }
}
