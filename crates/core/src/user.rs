//! User model - elders who post tasks and students who help with them.

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use crate::id::UserId;
use crate::Day;

/// Highest rating a helper can receive.
pub const MAX_RATING: f64 = 5.0;

/// A person known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Login email
    pub email: String,

    /// Display name
    pub name: String,

    /// Students help with tasks; everyone else posts them
    #[serde(default)]
    pub is_student: bool,

    /// Free-form profile text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Running average of received ratings, in [0, 5]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    /// Number of ratings folded into `rating`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u32>,

    /// When a student can take on work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
}

/// Weekly availability of a helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Master switch
    pub is_available: bool,

    /// Lowercase weekday names the helper never works on
    #[serde(default)]
    pub unavailable_days: Vec<String>,
}

impl Availability {
    /// Available every day of the week.
    pub fn always() -> Self {
        Self {
            is_available: true,
            unavailable_days: Vec::new(),
        }
    }

    /// Whether work on `day` fits this schedule.
    pub fn allows(&self, day: Day) -> bool {
        let name = weekday_name(day);
        self.is_available && !self.unavailable_days.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}

/// Lowercase English name of the weekday `day` falls on.
pub fn weekday_name(day: Day) -> &'static str {
    match day.weekday() {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Partial update of a user record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New display name
    pub name: Option<String>,
    /// New profile text
    pub description: Option<String>,
    /// New availability
    pub availability: Option<Availability>,
    /// New average rating
    pub rating: Option<f64>,
    /// New rating count
    pub rating_count: Option<u32>,
}

impl User {
    /// Merge `patch` into this record.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(availability) = patch.availability {
            self.availability = Some(availability);
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating.clamp(0.0, MAX_RATING));
        }
        if let Some(count) = patch.rating_count {
            self.rating_count = Some(count);
        }
    }

    /// Patch that folds one more `rating` into the running average.
    ///
    /// `new = (old * count + rating) / (count + 1)`; a user without a
    /// rating history starts from zero.
    pub fn rating_update(&self, rating: u8) -> UserPatch {
        let count = self.rating_count.unwrap_or(0);
        let total = self.rating.unwrap_or(0.0) * f64::from(count);
        let new_count = count + 1;
        UserPatch {
            rating: Some((total + f64::from(rating)) / f64::from(new_count)),
            rating_count: Some(new_count),
            ..UserPatch::default()
        }
    }

    /// Whether this user can be hired for work on `day`.
    pub fn is_available_on(&self, day: Day) -> bool {
        self.availability.as_ref().is_some_and(|a| a.allows(day))
    }
}
