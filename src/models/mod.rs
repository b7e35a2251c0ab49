pub mod attachment;
pub mod subtask;
pub mod task;
pub mod user;

use std::borrow::Cow;

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

pub use attachment::{Attachment, NewAttachment};
pub use subtask::{NewSubtask, Subtask, SubtaskPayload};
pub use task::{NewTask, Task, TaskPayload, TaskQuery, TaskView};
pub use user::{AccountDeletion, PasswordChange, ProfileChanges, SignupInput, TokenRequest, User, UserProfile};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use together with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Rejects strings that are empty or whitespace only.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::from("This field may not be blank."));
        return Err(error);
    }
    Ok(())
}
