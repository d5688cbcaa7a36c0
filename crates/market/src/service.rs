//! Marketplace service: one session ("tab") over shared storage.
//!
//! Every user-facing operation goes through here. The stores below only
//! guard lifecycle rules; who may do what is decided in this layer.

use helpboard_core::{
    Availability, Message, MessageId, Notification, NotificationId, PaymentMethod, SessionId,
    Task, TaskDraft, TaskId, TaskPatch, TaskStatus, User, UserId, UserPatch, ValidationError,
};
use helpboard_storage::{keys, SharedStorage, Storage, StorageEvent};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use crate::config::MarketConfig;
use crate::directory::UserDirectory;
use crate::error::{MarketError, Result};
use crate::notifications::NotificationCenter;
use crate::payment::CardDetails;
use crate::tasks::TaskStore;

/// Something that changed in the marketplace, as seen by this session.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Session identity changed through login, logout or switch
    SessionChanged(Option<UserId>),
    /// A user record was edited
    UserChanged(UserId),
    /// New task posted
    TaskPosted(TaskId),
    /// App payment went through
    TaskPaid(TaskId),
    /// Helper hired
    HelperAssigned {
        /// Task the helper was hired for
        task: TaskId,
        /// The hired student
        helper: UserId,
    },
    /// Chat message appended
    MessageSent {
        /// Task the thread belongs to
        task: TaskId,
        /// The new message
        message: MessageId,
    },
    /// Video call started from the chat
    VideoCallStarted(TaskId),
    /// Task rated and removed
    TaskCompleted {
        /// Completed task
        task: TaskId,
        /// Rated helper
        helper: Option<UserId>,
        /// Rating given
        rating: u8,
    },
    /// Task fields edited
    TaskUpdated(TaskId),
    /// Task removed without completion
    TaskDeleted(TaskId),
    /// Another session wrote a storage key this session mirrors
    RemoteChange {
        /// Storage key that changed
        key: String,
    },
}

/// Student shown when an elder picks a helper.
#[derive(Debug, Clone)]
pub struct HelperCandidate {
    /// The student
    pub user: User,
    /// Free on every day the task is scheduled for
    pub available: bool,
}

/// A marketplace session.
///
/// Several sessions may share one storage; each keeps its own snapshot and
/// its own identity, and picks up the others' writes through [`sync`].
///
/// [`sync`]: Marketplace::sync
pub struct Marketplace<S: Storage> {
    config: MarketConfig,
    session: SessionId,
    users: UserDirectory<S>,
    tasks: TaskStore<S>,
    notifications: NotificationCenter<S>,
    changes: broadcast::Receiver<StorageEvent>,
    events: broadcast::Sender<MarketEvent>,
}

impl<S: Storage> Marketplace<S> {
    /// Open a session over `storage`, seeding it if it is empty.
    pub async fn open(storage: SharedStorage<S>, config: MarketConfig) -> Result<Self> {
        let session = SessionId::generate();
        // Subscribe before loading so nothing written in between is missed.
        let changes = storage.lock().await.subscribe();

        let users = UserDirectory::load(storage.clone(), session.clone(), &config).await?;
        let tasks = TaskStore::load(storage.clone(), session.clone(), config.seed_demo_data).await?;
        let notifications = NotificationCenter::load(storage, session.clone()).await?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        info!(
            session = %session,
            user = ?users.current().map(|u| u.id.as_str()),
            tasks = tasks.all().len(),
            "marketplace session opened"
        );
        Ok(Self {
            config,
            session,
            users,
            tasks,
            notifications,
            changes,
            events,
        })
    }

    /// This session's id.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// The user directory.
    pub fn users(&self) -> &UserDirectory<S> {
        &self.users
    }

    /// The task store.
    pub fn tasks(&self) -> &TaskStore<S> {
        &self.tasks
    }

    /// The notification center.
    pub fn notifications(&self) -> &NotificationCenter<S> {
        &self.notifications
    }

    /// Receive marketplace events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: MarketEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Apply writes other sessions made since the last call.
    ///
    /// Returns how many updates were applied. The stored current user is
    /// never taken over: each session keeps acting as whoever it logged in
    /// as.
    pub async fn sync(&mut self) -> Result<usize> {
        let mut applied = 0;
        loop {
            match self.changes.try_recv() {
                Ok(event) => {
                    if self.apply_remote(event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed storage events, reloading from storage");
                    self.users.reload_users().await?;
                    self.tasks.reload().await?;
                    self.notifications.reload().await?;
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        Ok(applied)
    }

    fn apply_remote(&mut self, event: StorageEvent) -> bool {
        if event.origin == self.session {
            return false;
        }
        let Some(raw) = event.new_value.as_deref() else {
            return false;
        };
        let applied = match event.key.as_str() {
            keys::USERS => self.users.apply_remote(raw),
            keys::TASKS => self.tasks.apply_remote(raw),
            keys::NOTIFICATIONS => self.notifications.apply_remote(raw),
            _ => false,
        };
        if applied {
            debug!(key = %event.key, from = %event.origin, "applied remote change");
            self.emit(MarketEvent::RemoteChange { key: event.key });
        }
        applied
    }

    // Identity

    /// User this session acts as.
    pub fn current_user(&self) -> Option<&User> {
        self.users.current()
    }

    fn require_user(&self, action: &'static str) -> Result<User> {
        self.users
            .current()
            .cloned()
            .ok_or(MarketError::NotAuthenticated(action))
    }

    fn require_task(&self, id: &TaskId) -> Result<Task> {
        self.tasks
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::TaskNotFound(id.clone()))
    }

    fn require_owner(&self, action: &'static str, id: &TaskId) -> Result<(User, Task)> {
        let user = self.require_user(action)?;
        let task = self.require_task(id)?;
        if !task.is_owned_by(&user.id) {
            return Err(MarketError::not_authorized(
                action,
                "only the poster of the task can do that",
            ));
        }
        Ok((user, task))
    }

    fn require_participant(&self, action: &'static str, id: &TaskId) -> Result<(User, Task)> {
        let user = self.require_user(action)?;
        let task = self.require_task(id)?;
        if !task.is_owned_by(&user.id) && !task.is_assigned_to(&user.id) {
            return Err(MarketError::not_authorized(
                action,
                "only the poster and the hired helper take part in this task",
            ));
        }
        Ok((user, task))
    }

    fn require_open_chat(&self, action: &'static str, id: &TaskId) -> Result<(User, Task)> {
        let (user, task) = self.require_participant(action, id)?;
        if task.status != TaskStatus::InProgress {
            return Err(MarketError::transition(id, action, "chat opens once a helper is hired"));
        }
        Ok((user, task))
    }

    /// Log in by email, creating the user if nobody has that email.
    pub async fn login(&mut self, email: &str, name: Option<&str>) -> Result<User> {
        if email.trim().is_empty() {
            return Err(ValidationError {
                field: "email",
                message: "email is required".to_string(),
            }
            .into());
        }
        let user = self.users.login(email, name).await?;
        self.emit(MarketEvent::SessionChanged(Some(user.id.clone())));
        Ok(user)
    }

    /// Fall back to the default identity.
    pub async fn logout(&mut self) -> Result<Option<User>> {
        let user = self.users.logout().await?;
        self.emit(MarketEvent::SessionChanged(user.as_ref().map(|u| u.id.clone())));
        Ok(user)
    }

    /// Toggle between the demo elder and the demo student.
    pub async fn switch_user(&mut self) -> Result<Option<User>> {
        let user = self.users.switch_user().await?;
        self.emit(MarketEvent::SessionChanged(user.as_ref().map(|u| u.id.clone())));
        Ok(user)
    }

    /// "Delete" the account. The record is kept, the session logs out.
    pub async fn delete_account(&mut self) -> Result<Option<User>> {
        let user = self.require_user("delete your account")?;
        info!(user = %user.id, "account deletion requested, logging out");
        self.logout().await
    }

    /// Edit the caller's own profile.
    pub async fn update_profile(
        &mut self,
        description: Option<String>,
        availability: Option<Availability>,
    ) -> Result<User> {
        let user = self.require_user("edit your profile")?;
        if availability.is_some() && !user.is_student {
            return Err(MarketError::not_authorized(
                "edit your profile",
                "only students publish availability",
            ));
        }
        let patch = UserPatch {
            description,
            availability,
            ..UserPatch::default()
        };
        let updated = self.users.update_user(&user.id, patch).await?;
        self.emit(MarketEvent::UserChanged(updated.id.clone()));
        Ok(updated)
    }

    // Tasks

    /// Tasks the caller gets to see.
    ///
    /// Students see open tasks plus the ones they were hired for; everyone
    /// else sees the tasks they posted.
    pub fn visible_tasks(&self) -> Result<Vec<&Task>> {
        let user = self.require_user("browse tasks")?;
        let visible = self
            .tasks
            .all()
            .iter()
            .filter(|t| {
                if user.is_student {
                    t.status == TaskStatus::Open || t.is_assigned_to(&user.id)
                } else {
                    t.is_owned_by(&user.id)
                }
            })
            .collect();
        Ok(visible)
    }

    /// Post a new task as the current user.
    pub async fn post_task(&mut self, draft: TaskDraft) -> Result<Task> {
        let user = self.require_user("post a task")?;
        if user.is_student {
            return Err(MarketError::not_authorized(
                "post a task",
                "students help with tasks, they do not post them",
            ));
        }
        draft.validate()?;
        let task = self.tasks.create(Task::new(draft, &user)).await?;
        self.emit(MarketEvent::TaskPosted(task.id.clone()));
        Ok(task)
    }

    /// Pay for an app-paid task with a card.
    pub async fn pay_task(&mut self, id: &TaskId, card: &CardDetails) -> Result<Task> {
        let (_, task) = self.require_owner("pay for", id)?;
        if task.payment_method != PaymentMethod::App {
            return Err(MarketError::transition(id, "pay for", "it is paid in cash"));
        }
        if task.is_paid {
            return Err(MarketError::transition(id, "pay for", "it is already paid"));
        }
        card.validate()?;
        let paid = self.tasks.mark_paid(id).await?;
        info!(task = %id, card = %card.masked_number(), amount = paid.budget, "payment simulated");
        self.emit(MarketEvent::TaskPaid(id.clone()));
        Ok(paid)
    }

    /// Students the poster can pick from, with their availability for the
    /// task's days.
    pub fn available_helpers(&self, id: &TaskId) -> Result<Vec<HelperCandidate>> {
        let (_, task) = self.require_owner("browse helpers for", id)?;
        let days = task.days();
        let helpers = self
            .users
            .students()
            .map(|student| HelperCandidate {
                available: days.iter().all(|day| student.is_available_on(*day)),
                user: student.clone(),
            })
            .collect();
        Ok(helpers)
    }

    /// Hire `student` for a task and tell them about it.
    pub async fn assign_helper(&mut self, id: &TaskId, student: &UserId) -> Result<Task> {
        self.require_owner("hire a helper for", id)?;
        let helper = self
            .users
            .get(student)
            .cloned()
            .ok_or_else(|| MarketError::UserNotFound(student.clone()))?;
        if !helper.is_student {
            return Err(MarketError::not_authorized(
                "hire a helper for",
                format!("{} is not a student", helper.name),
            ));
        }

        let task = self.tasks.assign(id, &helper.id).await?;
        self.notifications
            .add(
                &helper.id,
                format!("You've been hired for \"{}\"!", task.title),
                format!("/tasks/{}", task.id),
            )
            .await?;
        self.emit(MarketEvent::HelperAssigned {
            task: task.id.clone(),
            helper: helper.id,
        });
        Ok(task)
    }

    /// Chat thread of a task, for its poster and hired helper.
    pub fn messages(&self, id: &TaskId) -> Result<Vec<Message>> {
        let (_, task) = self.require_participant("read the chat of", id)?;
        Ok(task.messages)
    }

    /// Post a chat message and notify the other party.
    pub async fn send_message(&mut self, id: &TaskId, text: &str) -> Result<Message> {
        let (user, task) = self.require_open_chat("chat about", id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError {
                field: "text",
                message: "message cannot be empty".to_string(),
            }
            .into());
        }

        let message = self.tasks.send_message(id, Message::new(user.id.clone(), text)).await?;
        if let Some(recipient) = task.counterpart(&user.id) {
            self.notifications
                .add(
                    recipient,
                    format!("New message from {} for task \"{}\"", user.name, task.title),
                    format!("/tasks/{}/chat", task.id),
                )
                .await?;
        }
        self.emit(MarketEvent::MessageSent {
            task: id.clone(),
            message: message.id.clone(),
        });
        Ok(message)
    }

    /// Start a video call from the chat. Returns the call link.
    pub async fn start_video_call(&mut self, id: &TaskId) -> Result<String> {
        let (user, task) = self.require_open_chat("start a video call for", id)?;
        let link = format!("/tasks/{}/video", task.id);

        self.tasks.send_message(id, Message::video_call(user.id.clone(), &link)).await?;
        if let Some(recipient) = task.counterpart(&user.id) {
            self.notifications
                .add(
                    recipient,
                    format!("{} started a video call for \"{}\"", user.name, task.title),
                    format!("/tasks/{}/chat", task.id),
                )
                .await?;
        }
        info!(task = %id, caller = %user.id, "video call started");
        self.emit(MarketEvent::VideoCallStarted(id.clone()));
        Ok(link)
    }

    /// Rate the helper and close the task.
    pub async fn complete_task(&mut self, id: &TaskId, rating: u8) -> Result<Task> {
        self.require_owner("complete", id)?;
        let completed = self.tasks.complete(id, rating, &mut self.users).await?;
        self.emit(MarketEvent::TaskCompleted {
            task: completed.id.clone(),
            helper: completed.applicant_id.clone(),
            rating,
        });
        Ok(completed)
    }

    /// Edit a task's fields. Payment only changes through [`pay_task`].
    ///
    /// [`pay_task`]: Marketplace::pay_task
    pub async fn edit_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let (_, task) = self.require_owner("edit", id)?;
        if patch.is_paid.is_some() {
            return Err(MarketError::not_authorized(
                "edit",
                "payment status changes only through payment",
            ));
        }
        let switches_method = patch
            .payment_method
            .is_some_and(|method| method != task.payment_method);
        if switches_method && task.status != TaskStatus::Open {
            return Err(MarketError::transition(
                id,
                "edit",
                "payment method is fixed once a helper is hired",
            ));
        }
        patch.validate()?;
        if patch.is_empty() {
            return self.require_task(id);
        }
        let updated = self.tasks.update(id, patch).await?;
        self.emit(MarketEvent::TaskUpdated(id.clone()));
        Ok(updated)
    }

    /// Delete a task nobody has been hired for yet.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<Task> {
        let (_, task) = self.require_owner("delete", id)?;
        if task.status == TaskStatus::InProgress {
            return Err(MarketError::transition(id, "delete", "a helper is already hired"));
        }
        let removed = self.tasks.delete(id).await?;
        self.emit(MarketEvent::TaskDeleted(id.clone()));
        Ok(removed)
    }

    // Notifications

    /// The caller's notifications, newest first.
    pub fn my_notifications(&self) -> Result<Vec<&Notification>> {
        let user = self.require_user("read notifications")?;
        Ok(self
            .notifications
            .all()
            .iter()
            .filter(|n| n.user_id == user.id)
            .collect())
    }

    /// Number of the caller's unread notifications.
    pub fn unread_count(&self) -> Result<usize> {
        let user = self.require_user("read notifications")?;
        Ok(self.notifications.unread_count(&user.id))
    }

    /// Mark one of the caller's notifications as read.
    pub async fn mark_notification_read(&mut self, id: &NotificationId) -> Result<()> {
        let user = self.require_user("read notifications")?;
        let owner = self
            .notifications
            .get(id)
            .map(|n| n.user_id.clone())
            .ok_or_else(|| MarketError::NotificationNotFound(id.clone()))?;
        if owner != user.id {
            return Err(MarketError::not_authorized(
                "read",
                "the notification belongs to someone else",
            ));
        }
        self.notifications.mark_as_read(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use helpboard_storage::{shared, MemoryStorage};

    async fn session(storage: &SharedStorage<MemoryStorage>) -> Marketplace<MemoryStorage> {
        Marketplace::open(storage.clone(), MarketConfig::default()).await.unwrap()
    }

    async fn fresh() -> Marketplace<MemoryStorage> {
        session(&shared(MemoryStorage::new())).await
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
    }

    fn draft(payment_method: PaymentMethod) -> TaskDraft {
        TaskDraft {
            title: "Sort out my garage".to_string(),
            description: "Boxes need to be moved to the shelves and labelled.".to_string(),
            service_type: "Housekeeping".to_string(),
            location: "Cupertino, CA".to_string(),
            budget: 30.0,
            payment_method,
            task_dates: vec![monday()],
        }
    }

    fn card() -> CardDetails {
        CardDetails {
            card_name: "Test Elder".to_string(),
            card_number: "4111 1111 1111 1111".to_string(),
            expiry_date: "12/29".to_string(),
            cvc: "321".to_string(),
        }
    }

    fn visible_ids(market: &Marketplace<MemoryStorage>) -> Vec<TaskId> {
        market.visible_tasks().unwrap().iter().map(|t| t.id.clone()).collect()
    }

    async fn login_student(market: &mut Marketplace<MemoryStorage>, email: &str) -> User {
        market.login(email, None).await.unwrap()
    }

    #[tokio::test]
    async fn elder_sees_only_their_own_tasks() {
        let market = fresh().await;
        assert_eq!(market.current_user().unwrap().id, UserId::from("elder1"));

        let visible = visible_ids(&market);
        assert_eq!(visible, vec![TaskId::from("1"), TaskId::from("2")]);
    }

    #[tokio::test]
    async fn student_sees_open_tasks_and_their_own_jobs() {
        let mut market = fresh().await;
        login_student(&mut market, "test.student@example.com").await;

        let visible = visible_ids(&market);
        assert_eq!(visible, vec![TaskId::from("2"), TaskId::from("3")]);
    }

    #[tokio::test]
    async fn students_cannot_post() {
        let mut market = fresh().await;
        login_student(&mut market, "test.student@example.com").await;

        let err = market.post_task(draft(PaymentMethod::Cash)).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_before_anything_is_stored() {
        let mut market = fresh().await;
        let mut bad = draft(PaymentMethod::Cash);
        bad.budget = 2.0;

        let err = market.post_task(bad).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(ref v) if v.field == "budget"));
        assert_eq!(market.tasks().all().len(), 3);
    }

    #[tokio::test]
    async fn app_task_must_be_paid_before_hiring() {
        let mut market = fresh().await;
        let mut events = market.subscribe();
        let task = market.post_task(draft(PaymentMethod::App)).await.unwrap();
        assert!(!task.is_paid);
        assert_eq!(events.recv().await.unwrap(), MarketEvent::TaskPosted(task.id.clone()));

        let student = UserId::from("student1");
        let err = market.assign_helper(&task.id, &student).await.unwrap_err();
        assert!(matches!(err, MarketError::PaymentRequired(_)));

        let paid = market.pay_task(&task.id, &card()).await.unwrap();
        assert!(paid.is_paid);
        let again = market.pay_task(&task.id, &card()).await.unwrap_err();
        assert!(matches!(again, MarketError::InvalidTransition { .. }));

        let hired = market.assign_helper(&task.id, &student).await.unwrap();
        assert_eq!(hired.status, TaskStatus::InProgress);
        assert_eq!(hired.applicant_id, Some(student.clone()));

        let note = market.notifications().for_user(&student).next().unwrap();
        assert_eq!(note.message, "You've been hired for \"Sort out my garage\"!");
        assert_eq!(note.link, format!("/tasks/{}", task.id));
    }

    #[tokio::test]
    async fn bad_card_leaves_task_unpaid() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::App)).await.unwrap();
        let mut bad = card();
        bad.cvc = "1".to_string();

        let err = market.pay_task(&task.id, &bad).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)));
        assert!(!market.tasks().get(&task.id).unwrap().is_paid);
    }

    #[tokio::test]
    async fn only_the_poster_can_manage_a_task() {
        let mut market = fresh().await;
        login_student(&mut market, "test.student@example.com").await;
        let task = TaskId::from("3");

        let err = market.assign_helper(&task, &UserId::from("student1")).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        let err = market.delete_task(&task).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        let err = market.available_helpers(&task).unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn elders_cannot_be_hired() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();

        let err = market.assign_helper(&task.id, &UserId::from("elder1")).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        let err = market.assign_helper(&task.id, &UserId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, MarketError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn helper_availability_follows_task_days() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();

        let helpers = market.available_helpers(&task.id).unwrap();
        assert_eq!(helpers.len(), 7);
        let available = |id: &str| {
            helpers.iter().find(|h| h.user.id == UserId::from(id)).unwrap().available
        };
        assert!(available("student1"));
        assert!(!available("student2"));
        assert!(!available("student5"));
    }

    #[tokio::test]
    async fn chat_is_limited_to_poster_and_helper() {
        let mut market = fresh().await;
        let task = TaskId::from("1");

        let sent = market.send_message(&task, "  See you at three  ").await.unwrap();
        assert_eq!(sent.text, "See you at three");
        let student = UserId::from("student2");
        let note = market.notifications().for_user(&student).next().unwrap();
        assert_eq!(
            note.message,
            "New message from Test Elder for task \"Help planting my garden\""
        );
        assert_eq!(note.link, "/tasks/1/chat");

        let err = market.send_message(&task, "   ").await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)));

        login_student(&mut market, "test.student@example.com").await;
        let err = market.send_message(&task, "hello").await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        let err = market.messages(&task).unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
    }

    #[tokio::test]
    async fn chat_stays_closed_until_someone_is_hired() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();

        let err = market.send_message(&task.id, "anyone?").await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn video_call_posts_link_and_notifies() {
        let mut market = fresh().await;
        login_student(&mut market, "test.student@example.com").await;
        let task = TaskId::from("2");

        let link = market.start_video_call(&task).await.unwrap();
        assert_eq!(link, "/tasks/2/video");
        let messages = market.messages(&task).unwrap();
        assert_eq!(messages.last().unwrap().video_call_link(), Some("/tasks/2/video"));

        let elder = UserId::from("elder1");
        let note = market.notifications().for_user(&elder).next().unwrap();
        assert_eq!(
            note.message,
            "Test Student started a video call for \"Tech help with new Smart TV\""
        );
    }

    #[tokio::test]
    async fn completing_rates_the_helper_and_removes_the_task() {
        let mut market = fresh().await;
        let task = TaskId::from("1");

        let completed = market.complete_task(&task, 5).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(market.tasks().get(&task).is_none());

        let helper = market.users().get(&UserId::from("student2")).unwrap();
        assert_eq!(helper.rating_count, Some(26));
        let expected = (4.9 * 25.0 + 5.0) / 26.0;
        assert!((helper.rating.unwrap() - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn open_tasks_cannot_be_completed() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();

        let err = market.complete_task(&task.id, 4).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
        let err = market.complete_task(&TaskId::from("1"), 6).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidRating(6)));
    }

    #[tokio::test]
    async fn hired_tasks_cannot_be_deleted() {
        let mut market = fresh().await;
        let err = market.delete_task(&TaskId::from("1")).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();
        market.delete_task(&task.id).await.unwrap();
        assert!(market.tasks().get(&task.id).is_none());
    }

    #[tokio::test]
    async fn edits_cannot_touch_payment() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::App)).await.unwrap();

        let err = market
            .edit_task(&task.id, TaskPatch { is_paid: Some(true), ..TaskPatch::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));

        let edited = market
            .edit_task(&task.id, TaskPatch { budget: Some(45.0), ..TaskPatch::default() })
            .await
            .unwrap();
        assert_eq!(edited.budget, 45.0);
        assert!(!edited.is_paid);
    }

    #[tokio::test]
    async fn notifications_are_private() {
        let mut market = fresh().await;
        market.send_message(&TaskId::from("1"), "Tomorrow works").await.unwrap();
        let id = market
            .notifications()
            .for_user(&UserId::from("student2"))
            .next()
            .unwrap()
            .id
            .clone();

        let err = market.mark_notification_read(&id).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));
        assert!(market.my_notifications().unwrap().is_empty());

        market.login("samantha.lee@example.com", None).await.unwrap();
        assert_eq!(market.unread_count().unwrap(), 1);
        market.mark_notification_read(&id).await.unwrap();
        assert_eq!(market.unread_count().unwrap(), 0);
        assert_eq!(market.my_notifications().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn students_keep_availability_elders_cannot_set_it() {
        let mut market = fresh().await;
        let err = market
            .update_profile(None, Some(Availability::always()))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotAuthorized { .. }));

        login_student(&mut market, "test.student@example.com").await;
        let updated = market
            .update_profile(Some("Weekends only now".to_string()), None)
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Weekends only now"));
        assert!(updated.availability.is_some());
    }

    #[tokio::test]
    async fn other_sessions_pick_up_writes_on_sync() {
        let storage = shared(MemoryStorage::new());
        let mut first = session(&storage).await;
        let mut second = session(&storage).await;
        let mut events = second.subscribe();

        let task = first.post_task(draft(PaymentMethod::Cash)).await.unwrap();
        assert!(second.tasks().get(&task.id).is_none());

        assert_eq!(second.sync().await.unwrap(), 1);
        assert!(second.tasks().get(&task.id).is_some());
        assert_eq!(
            events.recv().await.unwrap(),
            MarketEvent::RemoteChange { key: keys::TASKS.to_string() }
        );
        // Own writes are not echoed back.
        assert_eq!(first.sync().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn identity_is_per_session() {
        let storage = shared(MemoryStorage::new());
        let mut first = session(&storage).await;
        let mut second = session(&storage).await;

        first.login("brand.new.student@example.com", Some("Nova")).await.unwrap();
        second.sync().await.unwrap();

        assert_eq!(second.current_user().unwrap().id, UserId::from("elder1"));
        assert!(second.users().find_by_email("brand.new.student@example.com").is_some());
    }

    #[tokio::test]
    async fn logged_out_session_without_default_user_is_refused() {
        let config = MarketConfig {
            default_user: UserId::from("nobody"),
            ..MarketConfig::default()
        };
        let mut market = Marketplace::open(shared(MemoryStorage::new()), config).await.unwrap();
        assert!(market.current_user().is_none());

        let err = market.post_task(draft(PaymentMethod::Cash)).await.unwrap_err();
        assert!(matches!(err, MarketError::NotAuthenticated(_)));
        assert!(matches!(market.visible_tasks(), Err(MarketError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn state_survives_reopening_file_storage() {
        use helpboard_storage::JsonStorage;

        let dir = tempfile::tempdir().unwrap();
        let task = {
            let storage = shared(JsonStorage::new(dir.path()).await.unwrap());
            let mut market = Marketplace::open(storage, MarketConfig::default()).await.unwrap();
            market.post_task(draft(PaymentMethod::Cash)).await.unwrap()
        };

        let storage = shared(JsonStorage::new(dir.path()).await.unwrap());
        let market = Marketplace::open(storage, MarketConfig::default()).await.unwrap();
        assert_eq!(market.tasks().all()[0].id, task.id);
        assert_eq!(market.tasks().all().len(), 4);
    }

    #[tokio::test]
    async fn switching_to_app_payment_requires_paying_before_hiring() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();
        let to_app = TaskPatch {
            payment_method: Some(PaymentMethod::App),
            ..TaskPatch::default()
        };

        let edited = market.edit_task(&task.id, to_app).await.unwrap();
        assert_eq!(edited.payment_method, PaymentMethod::App);
        assert!(!edited.is_paid);

        let student = UserId::from("student1");
        let err = market.assign_helper(&task.id, &student).await.unwrap_err();
        assert!(matches!(err, MarketError::PaymentRequired(_)));

        market.pay_task(&task.id, &card()).await.unwrap();
        let hired = market.assign_helper(&task.id, &student).await.unwrap();
        assert_eq!(hired.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn payment_method_is_fixed_once_hired() {
        let mut market = fresh().await;
        let to_app = TaskPatch {
            payment_method: Some(PaymentMethod::App),
            ..TaskPatch::default()
        };

        let err = market.edit_task(&TaskId::from("1"), to_app).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
        assert_eq!(
            market.tasks().get(&TaskId::from("1")).unwrap().payment_method,
            PaymentMethod::Cash
        );
    }

    #[tokio::test]
    async fn cash_tasks_are_never_paid_by_card() {
        let mut market = fresh().await;
        let task = market.post_task(draft(PaymentMethod::App)).await.unwrap();
        let to_cash = TaskPatch {
            payment_method: Some(PaymentMethod::Cash),
            ..TaskPatch::default()
        };

        let edited = market.edit_task(&task.id, to_cash).await.unwrap();
        assert!(edited.is_paid);

        let err = market.pay_task(&task.id, &card()).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        let cash = market.post_task(draft(PaymentMethod::Cash)).await.unwrap();
        let err = market.pay_task(&cash.id, &card()).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn deleting_account_keeps_record_and_logs_out() {
        let mut market = fresh().await;
        let user = market.login("michael.chen@example.com", None).await.unwrap();
        let mut events = market.subscribe();

        let now = market.delete_account().await.unwrap().unwrap();
        assert_eq!(now.id, UserId::from("elder1"));
        assert_eq!(market.current_user().unwrap().id, now.id);
        assert!(market.users().get(&user.id).is_some());
        assert_eq!(
            events.recv().await.unwrap(),
            MarketEvent::SessionChanged(Some(UserId::from("elder1")))
        );
    }

    #[tokio::test]
    async fn lagging_session_reloads_everything_on_sync() {
        let storage = shared(MemoryStorage::new());
        let mut first = session(&storage).await;
        let mut second = session(&storage).await;
        login_student(&mut second, "test.student@example.com").await;
        first.sync().await.unwrap();

        // Each message writes tasks and notifications, overflowing the
        // storage event buffer.
        let task = TaskId::from("1");
        for i in 0..40 {
            first.send_message(&task, &format!("update {i}")).await.unwrap();
        }

        assert!(second.sync().await.unwrap() >= 1);
        assert_eq!(
            second.tasks().get(&task).unwrap().messages,
            first.tasks().get(&task).unwrap().messages
        );
        assert_eq!(second.tasks().get(&task).unwrap().messages.len(), 42);
        assert_eq!(second.notifications().all().len(), 40);
        assert_eq!(second.current_user().unwrap().id, UserId::from("student1"));
        assert_ne!(first.session(), second.session());
    }
}
