use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{double_option, not_blank};
use crate::error::{AppError, FieldErrors};

/// A checklist item belonging to a task. Access follows the parent task's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subtask {
    pub id: i64,
    /// Parent task. Fixed at creation.
    #[serde(rename = "task")]
    pub task_id: i64,
    pub title: String,
    pub completed: bool,
}

/// Request body for `POST /subtasks/`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSubtask {
    #[validate(required)]
    pub task: Option<i64>,
    #[validate(
        required,
        custom = "not_blank",
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Request body for updating a subtask. The parent task cannot be changed.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct SubtaskPayload {
    #[serde(default, deserialize_with = "double_option")]
    #[validate(
        custom = "not_blank",
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub completed: Option<Option<bool>>,
}

impl SubtaskPayload {
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
        if let Some(None) = self.completed {
            errors.add("completed", "This field may not be null.");
        }
        errors.into_result()
    }

    pub fn apply_to(self, subtask: &mut Subtask) {
        if let Some(Some(title)) = self.title {
            subtask.title = title;
        }
        if let Some(Some(completed)) = self.completed {
            subtask.completed = completed;
        }
    }
}
