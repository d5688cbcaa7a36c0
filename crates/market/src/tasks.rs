//! Task store: the active tasks and their lifecycle.
//!
//! ```text
//! create ──> Open ──assign──> InProgress ──complete──> Completed ──> purged
//! ```
//!
//! The store enforces the lifecycle and the payment precondition only.
//! Who may call what is decided by [`crate::Marketplace`].

use helpboard_core::{Message, SessionId, Task, TaskId, TaskPatch, TaskStatus, UserId};
use helpboard_storage::{keys, load_json, save_json, SharedStorage, Storage, StorageError};
use tracing::{debug, info, warn};
use crate::directory::UserDirectory;
use crate::error::{MarketError, Result};
use crate::seed;

/// Lowest and highest rating accepted on completion.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Active tasks, newest first, mirrored to the `tasks` key.
pub struct TaskStore<S: Storage> {
    storage: SharedStorage<S>,
    session: SessionId,
    tasks: Vec<Task>,
    seed: bool,
}

impl<S: Storage> TaskStore<S> {
    /// Load tasks from storage, seeding when missing or unreadable.
    pub async fn load(storage: SharedStorage<S>, session: SessionId, seed: bool) -> Result<Self> {
        let mut store = Self {
            storage,
            session,
            tasks: Vec::new(),
            seed,
        };
        store.reload().await?;
        Ok(store)
    }

    /// Re-read the task list from storage.
    pub async fn reload(&mut self) -> Result<()> {
        let loaded = {
            let storage = self.storage.lock().await;
            load_json::<_, Vec<Task>>(&*storage, keys::TASKS).await
        };
        match loaded {
            Ok(Some(tasks)) => self.tasks = tasks,
            Ok(None) => {
                self.tasks = self.seed_tasks();
                self.persist().await?;
            }
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "stored tasks are unreadable, falling back to seed data");
                self.tasks = self.seed_tasks();
                self.persist().await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn seed_tasks(&self) -> Vec<Task> {
        if self.seed { seed::tasks() } else { Vec::new() }
    }

    async fn persist(&self) -> Result<()> {
        let mut storage = self.storage.lock().await;
        save_json(&mut *storage, &self.session, keys::TASKS, &self.tasks).await?;
        debug!(count = self.tasks.len(), "persisted tasks");
        Ok(())
    }

    fn position(&self, id: &TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| MarketError::TaskNotFound(id.clone()))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        let idx = self.position(id)?;
        Ok(&mut self.tasks[idx])
    }

    /// All active tasks, newest first.
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    /// Look up a task.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Add a new task at the front of the list.
    ///
    /// Whatever status the caller set, the task enters the store open and
    /// unassigned.
    pub async fn create(&mut self, mut task: Task) -> Result<Task> {
        task.status = TaskStatus::Open;
        task.applicant_id = None;
        self.tasks.insert(0, task.clone());
        self.persist().await?;
        info!(task = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Assign `student` to an open task.
    ///
    /// App-paid tasks must be paid first.
    pub async fn assign(&mut self, id: &TaskId, student: &UserId) -> Result<Task> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Open {
            return Err(MarketError::transition(id, "assign", format!("task is {}", task.status)));
        }
        if task.awaiting_payment() {
            return Err(MarketError::PaymentRequired(id.clone()));
        }

        task.applicant_id = Some(student.clone());
        task.status = TaskStatus::InProgress;
        let assigned = task.clone();
        self.persist().await?;
        info!(task = %id, helper = %student, "helper assigned");
        Ok(assigned)
    }

    /// Append `message` to the task's thread.
    pub async fn send_message(&mut self, id: &TaskId, message: Message) -> Result<Message> {
        let task = self.task_mut(id)?;
        task.messages.push(message.clone());
        self.persist().await?;
        debug!(task = %id, message = %message.id, "message appended");
        Ok(message)
    }

    /// Mark an app-paid task as paid.
    pub async fn mark_paid(&mut self, id: &TaskId) -> Result<Task> {
        let task = self.task_mut(id)?;
        task.is_paid = true;
        let paid = task.clone();
        self.persist().await?;
        info!(task = %id, "task paid");
        Ok(paid)
    }

    /// Rate the helper and close the task out.
    ///
    /// Only an assigned, in-progress task can be completed. The helper's
    /// running average is updated in `users`, the task is removed from the
    /// store, and the completed snapshot is returned. A helper who is no
    /// longer in the directory is skipped; the task is still removed.
    pub async fn complete(
        &mut self,
        id: &TaskId,
        rating: u8,
        users: &mut UserDirectory<S>,
    ) -> Result<Task> {
        if !RATING_RANGE.contains(&rating) {
            return Err(MarketError::InvalidRating(rating));
        }

        let idx = self.position(id)?;
        let task = &self.tasks[idx];
        let helper = match (&task.applicant_id, task.status) {
            (Some(helper), TaskStatus::InProgress) => helper.clone(),
            (None, _) => {
                return Err(MarketError::transition(id, "complete", "no helper has been assigned"));
            }
            (Some(_), status) => {
                return Err(MarketError::transition(id, "complete", format!("task is {status}")));
            }
        };

        match users.record_rating(&helper, rating).await {
            Ok(user) => {
                info!(helper = %helper, rating, average = ?user.rating, "helper rated");
            }
            Err(MarketError::UserNotFound(_)) => {
                warn!(helper = %helper, "rated helper is not in the directory");
            }
            Err(e) => return Err(e),
        }

        let mut completed = self.tasks.remove(idx);
        completed.status = TaskStatus::Completed;
        self.persist().await?;
        info!(task = %id, "task completed");
        Ok(completed)
    }

    /// Remove a task regardless of its state.
    pub async fn delete(&mut self, id: &TaskId) -> Result<Task> {
        let idx = self.position(id)?;
        let removed = self.tasks.remove(idx);
        self.persist().await?;
        info!(task = %id, "task deleted");
        Ok(removed)
    }

    /// Field-level edit; status and assignment are left alone.
    pub async fn update(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let task = self.task_mut(id)?;
        task.apply(patch);
        let updated = task.clone();
        self.persist().await?;
        debug!(task = %id, "task updated");
        Ok(updated)
    }

    /// Replace the task list with a value written by another session.
    ///
    /// Returns false (and keeps the current snapshot) if the value does not
    /// parse.
    pub fn apply_remote(&mut self, raw: &str) -> bool {
        match serde_json::from_str(raw) {
            Ok(tasks) => {
                self.tasks = tasks;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable tasks update");
                false
            }
        }
    }
}
