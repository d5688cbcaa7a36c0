//! Task model - a job an elder posts and a student helps with.

use serde::{Deserialize, Serialize};
use crate::id::{MessageId, TaskId, UserId};
use crate::catalog::is_known_service_type;
use crate::user::User;
use crate::{Day, Time};

/// Text prefix marking a chat message as a video-call invitation.
pub const VIDEO_CALL_PREFIX: &str = "VIDEO_CALL:";

const MIN_TITLE_LEN: usize = 4;
const MIN_DESCRIPTION_LEN: usize = 20;
const MIN_LOCATION_LEN: usize = 3;
const MIN_BUDGET: f64 = 5.0;

/// A posted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Short title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Catalogue service the task falls under
    pub service_type: String,

    /// Where the work happens
    pub location: String,

    /// Offered amount in dollars
    pub budget: f64,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Primary date, used for sorting and availability checks
    pub task_date: Day,

    /// Every day the task spans
    #[serde(default)]
    pub task_dates: Vec<Day>,

    /// Poster
    pub creator_id: UserId,

    /// Poster's display name at posting time
    pub creator_name: String,

    /// Assigned helper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<UserId>,

    /// How the helper gets paid
    pub payment_method: PaymentMethod,

    /// Whether the budget has been paid in (always true for cash)
    #[serde(default)]
    pub is_paid: bool,

    /// Conversation between poster and helper, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Task lifecycle: `Open → InProgress → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Posted, nobody assigned
    Open,
    /// A helper has been assigned
    InProgress,
    /// Rated and closed; only observed right before the task is purged
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Open => write!(f, "open"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// How a task is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Settled in person
    Cash,
    /// Paid into the app up front
    App,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::App => write!(f, "app"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "app" => Ok(PaymentMethod::App),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// A chat message inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier
    pub id: MessageId,

    /// Body
    pub text: String,

    /// Author
    pub sender_id: UserId,

    /// When it was sent
    pub timestamp: Time,
}

impl Message {
    /// Create a message sent now.
    pub fn new(sender_id: UserId, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            sender_id,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a video-call invitation pointing at `link`.
    pub fn video_call(sender_id: UserId, link: &str) -> Self {
        Self::new(sender_id, format!("{VIDEO_CALL_PREFIX}{link}"))
    }

    /// Call link if this message is a video-call invitation.
    pub fn video_call_link(&self) -> Option<&str> {
        self.text.strip_prefix(VIDEO_CALL_PREFIX)
    }
}

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Offending field
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Everything a poster supplies when posting a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Short title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Catalogue service type
    pub service_type: String,
    /// Where the work happens
    pub location: String,
    /// Offered amount in dollars
    pub budget: f64,
    /// How the helper gets paid
    pub payment_method: PaymentMethod,
    /// Days the task spans; the first one is the primary date
    pub task_dates: Vec<Day>,
}

impl TaskDraft {
    /// Check the draft against the posting rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_service_type(&self.service_type)?;
        check_location(&self.location)?;
        check_budget(self.budget)?;
        check_dates(&self.task_dates)?;
        Ok(())
    }
}

/// Partial edit of a task. `None` fields are left untouched.
///
/// Status and assignment only change through the lifecycle operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New service type
    pub service_type: Option<String>,
    /// New location
    pub location: Option<String>,
    /// New budget
    pub budget: Option<f64>,
    /// New payment method
    pub payment_method: Option<PaymentMethod>,
    /// New dates; the primary date follows the first entry
    pub task_dates: Option<Vec<Day>>,
    /// Payment flag
    pub is_paid: Option<bool>,
}

impl TaskPatch {
    /// Check the fields present in the patch against the posting rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(service_type) = &self.service_type {
            check_service_type(service_type)?;
        }
        if let Some(location) = &self.location {
            check_location(location)?;
        }
        if let Some(budget) = self.budget {
            check_budget(budget)?;
        }
        if let Some(dates) = &self.task_dates {
            check_dates(dates)?;
        }
        Ok(())
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Task {
    /// Build an open task from a draft posted by `creator`.
    ///
    /// Cash tasks count as paid; app tasks wait for payment.
    pub fn new(draft: TaskDraft, creator: &User) -> Self {
        let task_date = draft
            .task_dates
            .first()
            .copied()
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        Self {
            id: TaskId::generate(),
            title: draft.title,
            description: draft.description,
            service_type: draft.service_type,
            location: draft.location,
            budget: draft.budget,
            status: TaskStatus::Open,
            task_date,
            task_dates: draft.task_dates,
            creator_id: creator.id.clone(),
            creator_name: creator.name.clone(),
            applicant_id: None,
            payment_method: draft.payment_method,
            is_paid: draft.payment_method == PaymentMethod::Cash,
            messages: Vec::new(),
        }
    }

    /// Merge `patch` into this task.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(service_type) = patch.service_type {
            self.service_type = service_type;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(budget) = patch.budget {
            self.budget = budget;
        }
        if let Some(method) = patch.payment_method {
            if method != self.payment_method {
                // Cash counts as paid; a switch to app starts unpaid.
                self.is_paid = method == PaymentMethod::Cash;
            }
            self.payment_method = method;
        }
        if let Some(dates) = patch.task_dates {
            if let Some(first) = dates.first() {
                self.task_date = *first;
            }
            self.task_dates = dates;
        }
        if let Some(paid) = patch.is_paid {
            self.is_paid = paid;
        }
    }

    /// Whether `user` posted this task.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.creator_id == user
    }

    /// Whether `user` is the assigned helper.
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.applicant_id.as_ref() == Some(user)
    }

    /// Whether assignment is blocked on an outstanding app payment.
    pub fn awaiting_payment(&self) -> bool {
        self.payment_method == PaymentMethod::App && !self.is_paid
    }

    /// The other party of the conversation, seen from `user`.
    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        if self.is_owned_by(user) {
            self.applicant_id.as_ref()
        } else {
            Some(&self.creator_id)
        }
    }

    /// Every scheduled day; falls back to the primary date.
    pub fn days(&self) -> Vec<Day> {
        if self.task_dates.is_empty() {
            vec![self.task_date]
        } else {
            self.task_dates.clone()
        }
    }
}

fn check_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(ValidationError::new(
            "title",
            format!("must be at least {MIN_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        return Err(ValidationError::new(
            "description",
            format!("must be at least {MIN_DESCRIPTION_LEN} characters"),
        ));
    }
    Ok(())
}

fn check_service_type(service_type: &str) -> Result<(), ValidationError> {
    if !is_known_service_type(service_type) {
        return Err(ValidationError::new("serviceType", "please select a service type"));
    }
    Ok(())
}

fn check_location(location: &str) -> Result<(), ValidationError> {
    if location.trim().chars().count() < MIN_LOCATION_LEN {
        return Err(ValidationError::new("location", "location is required"));
    }
    Ok(())
}

fn check_budget(budget: f64) -> Result<(), ValidationError> {
    if !budget.is_finite() || budget < MIN_BUDGET {
        return Err(ValidationError::new(
            "budget",
            format!("must be at least ${MIN_BUDGET}"),
        ));
    }
    Ok(())
}

fn check_dates(dates: &[Day]) -> Result<(), ValidationError> {
    if dates.is_empty() {
        return Err(ValidationError::new(
            "taskDates",
            "at least one date for the task is required",
        ));
    }
    Ok(())
}
