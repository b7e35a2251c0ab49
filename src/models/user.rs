use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::blob::Upload;

lazy_static! {
    // Letters, digits and @.+-_ only.
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

/// A user row, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    /// Blob handle of the profile picture.
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The public representation of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// URL of the profile picture, if one is set.
    pub profile_picture: Option<String>,
}

/// Payload for a new account.
///
/// Fields are optional at the serde level so that missing ones are reported per
/// field instead of as a single deserialization failure.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(
        required,
        length(min = 1, max = 150),
        regex(path = "USERNAME_REGEX", message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")
    )]
    pub username: Option<String>,
    #[validate(required, email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(required, length(min = 1, max = 128))]
    pub password: Option<String>,
    #[validate(required, length(min = 1, max = 255))]
    pub full_name: Option<String>,
}

impl SignupInput {
    /// Builds the input from multipart text fields.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            username: fields.get("username").cloned(),
            email: fields.get("email").cloned(),
            password: fields.get("password").cloned(),
            full_name: fields.get("full_name").cloned(),
        }
    }
}

/// Partial profile update. Only present fields change.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct ProfileChanges {
    #[validate(
        length(min = 1, max = 150),
        regex(path = "USERNAME_REGEX", message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")
    )]
    pub username: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub full_name: Option<String>,
    /// Clears the current picture. Wins over `profile_picture`.
    #[serde(default, deserialize_with = "flag")]
    pub delete_picture: bool,
    /// Only reachable through multipart uploads.
    #[serde(skip)]
    pub profile_picture: Option<Upload>,
}

impl ProfileChanges {
    pub fn from_fields(fields: &HashMap<String, String>, picture: Option<Upload>) -> Self {
        Self {
            username: fields.get("username").cloned(),
            email: fields.get("email").cloned(),
            full_name: fields.get("full_name").cloned(),
            delete_picture: fields
                .get("delete_picture")
                .map(|value| is_truthy(value))
                .unwrap_or(false),
            profile_picture: picture,
        }
    }
}

/// Payload for `POST /change_password/`.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct PasswordChange {
    #[validate(required)]
    pub old_password: Option<String>,
    #[validate(required, length(min = 1, max = 128))]
    pub new_password: Option<String>,
    #[validate(required)]
    pub confirm_new_password: Option<String>,
}

/// Payload for `DELETE /delete_account/`: the caller re-types their username.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct AccountDeletion {
    #[validate(required)]
    pub username: Option<String>,
}

/// Payload for `POST /token/`.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(required)]
    pub username: Option<String>,
    #[validate(required)]
    pub password: Option<String>,
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// Accepts `true`/`false` as well as their string forms, as sent by HTML forms.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer) {
        Ok(Flag::Bool(value)) => Ok(value),
        Ok(Flag::Text(text)) => Ok(is_truthy(&text)),
        Err(_) => Err(de::Error::custom("expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signup(username: &str, email: &str, password: &str, full_name: &str) -> SignupInput {
        SignupInput {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
            full_name: Some(full_name.into()),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("alice", "a@x.com", "pw123", "Alice").validate().is_ok());
        assert!(signup("alice.b+1@home", "a@x.com", "pw123", "Alice")
            .validate()
            .is_ok());
        assert!(signup("alice b", "a@x.com", "pw123", "Alice").validate().is_err());
        assert!(signup("alice", "not-an-email", "pw123", "Alice")
            .validate()
            .is_err());
        assert!(signup("alice", "a@x.com", "", "Alice").validate().is_err());
        assert!(SignupInput::default().validate().is_err());
    }

    #[test]
    fn test_missing_signup_fields_are_reported_individually() {
        let input: SignupInput = serde_json::from_value(json!({ "username": "alice" })).unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("full_name"));
        assert!(!fields.contains_key("username"));
    }

    #[test]
    fn test_username_message() {
        let errors = signup("no spaces", "a@x.com", "pw", "A").validate().unwrap_err();
        let failures = errors.field_errors();
        let message = failures["username"][0].message.as_deref().unwrap_or_default();
        assert!(message.starts_with("Enter a valid username."));
    }

    #[test]
    fn test_delete_picture_flag_accepts_bool_and_text() {
        let changes: ProfileChanges =
            serde_json::from_value(json!({ "delete_picture": true })).unwrap();
        assert!(changes.delete_picture);
        let changes: ProfileChanges =
            serde_json::from_value(json!({ "delete_picture": "true" })).unwrap();
        assert!(changes.delete_picture);
        let changes: ProfileChanges =
            serde_json::from_value(json!({ "full_name": "Alice" })).unwrap();
        assert!(!changes.delete_picture);
        assert!(changes.profile_picture.is_none());
    }

    #[test]
    fn test_profile_changes_from_form_fields() {
        let mut fields = HashMap::new();
        fields.insert("full_name".to_string(), "Alice A.".to_string());
        fields.insert("delete_picture".to_string(), "on".to_string());

        let changes = ProfileChanges::from_fields(&fields, None);
        assert_eq!(changes.full_name.as_deref(), Some("Alice A."));
        assert!(changes.delete_picture);
        assert!(changes.username.is_none());
    }
}
