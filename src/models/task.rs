use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{double_option, not_blank, Attachment, Subtask};
use crate::error::{AppError, FieldErrors};

/// Represents a task entity as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: i64,
    /// Identifier of the user who owns the task. Fixed at creation.
    pub user_id: i64,
    pub title: String,
    /// Free-text notes.
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// When the owner wants to be reminded. Stored only; nothing schedules on it.
    pub remind_me: Option<DateTime<Utc>>,
    pub complete: bool,
    /// Freeform tag string, e.g. `"home, errands"`.
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task as returned to its owner, with its children embedded read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
    pub attachments: Vec<Attachment>,
}

/// Column values for a task about to be inserted.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub remind_me: Option<DateTime<Utc>>,
    pub complete: bool,
    pub tags: Option<String>,
}

/// Request body for creating or updating a task.
///
/// Every field is optional so that the same type serves full and partial updates.
/// For nullable columns an explicit `null` clears the value while an absent field
/// leaves it alone. There is no owner field; unknown keys such as
/// `user_id` are ignored.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct TaskPayload {
    #[serde(default, deserialize_with = "double_option")]
    #[validate(
        custom = "not_blank",
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub remind_me: Option<Option<DateTime<Utc>>>,
    /// `null` is rejected; the column is not nullable.
    #[serde(default, deserialize_with = "double_option")]
    pub complete: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub tags: Option<Option<String>>,
}

impl TaskPayload {
    /// Checks the payload. When `partial` is false every required field must be present.
    pub fn validate(&self, partial: bool) -> Result<(), AppError> {
        let mut errors = match Validate::validate(self) {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        match &self.title {
            None if !partial => errors.add("title", "This field is required."),
            Some(None) => errors.add("title", "This field may not be null."),
            _ => {}
        }
        if let Some(None) = self.complete {
            errors.add("complete", "This field may not be null.");
        }

        errors.into_result()
    }

    /// Converts a payload that passed `validate(false)` into insertable values.
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            title: self.title.flatten().unwrap_or_default(),
            notes: self.notes.flatten(),
            due_date: self.due_date.flatten(),
            remind_me: self.remind_me.flatten(),
            complete: self.complete.flatten().unwrap_or(false),
            tags: self.tags.flatten(),
        }
    }

    /// Overwrites only the fields present in the payload.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(Some(title)) = self.title {
            task.title = title;
        }
        if let Some(notes) = self.notes {
            task.notes = notes;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(remind_me) = self.remind_me {
            task.remind_me = remind_me;
        }
        if let Some(Some(complete)) = self.complete {
            task.complete = complete;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
    }
}

/// Query parameters for filtering the caller's task list.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TaskQuery {
    pub complete: Option<bool>,
    /// Case-insensitive match against title and notes.
    pub search: Option<String>,
    /// Substring match against the tag string.
    pub tag: Option<String>,
}
