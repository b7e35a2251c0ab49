//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! It centralizes error management, providing a consistent way to handle and represent
//! the failures of the credential store, the task repository, and the auth gate.
//!
//! `AppError` implements `actix_web::error::ResponseError` to convert application errors
//! into HTTP responses with JSON bodies. Field-level problems are carried as
//! [`FieldErrors`] and rendered as `{ "field": ["message", ...] }`, so clients can point
//! at the offending input. Sensitive account actions have dedicated variants with a
//! fixed, field-specific message.
//!
//! `From` implementations exist for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, and `bcrypt::BcryptError`, so `?` works everywhere.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Per-field validation messages, keyed by the request field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against `field`. A field may collect several messages.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Folds another set of errors into this one.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a `ValidationError`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(self))
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            for failure in failures {
                let message = match &failure.message {
                    Some(message) => message.to_string(),
                    None => default_message(&failure.code).to_string(),
                };
                out.add(field, message);
            }
        }
        out
    }
}

fn default_message(code: &str) -> &'static str {
    match code {
        "required" => "This field is required.",
        "email" => "Enter a valid email address.",
        "length" => "Ensure this field has a valid length.",
        "regex" => "Enter a valid value.",
        _ => "Invalid value.",
    }
}

/// Represents all possible errors that can occur within the application.
///
/// Each variant maps to one HTTP status. Ownership violations are reported as
/// `NotFound` so that other users' data cannot be probed.
#[derive(Debug)]
pub enum AppError {
    /// Missing or bad credentials (HTTP 401).
    Unauthorized(String),
    /// Malformed request that is not tied to a single field (HTTP 400).
    BadRequest(String),
    /// Absent or not-owned resource (HTTP 404).
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    DatabaseError(String),
    /// Per-field input validation failures (HTTP 400).
    ValidationError(FieldErrors),
    /// The supplied current password does not match the stored hash (HTTP 400).
    WrongPassword,
    /// New password and its confirmation differ (HTTP 400).
    PasswordMismatch,
    /// The confirmation username for account deletion is not the caller's (HTTP 400).
    UsernameMismatch,
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::ValidationError(FieldErrors::single(field, message))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(errors) => {
                write!(f, "Validation Error: ")?;
                let fields: Vec<&str> = errors.0.keys().map(String::as_str).collect();
                write!(f, "{}", fields.join(", "))
            }
            AppError::WrongPassword => write!(f, "Wrong password"),
            AppError::PasswordMismatch => write!(f, "Passwords do not match"),
            AppError::UsernameMismatch => write!(f, "Wrong username"),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_)
            | AppError::ValidationError(_)
            | AppError::WrongPassword
            | AppError::PasswordMismatch
            | AppError::UsernameMismatch => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AppError::Unauthorized(msg) | AppError::BadRequest(msg) | AppError::NotFound(msg) => {
                json!({ "error": msg })
            }
            AppError::InternalServerError(msg) | AppError::DatabaseError(msg) => {
                log::error!("{}", self);
                json!({ "error": msg })
            }
            AppError::ValidationError(errors) => json!(errors),
            AppError::WrongPassword => json!({ "old_password": "Wrong password." }),
            AppError::PasswordMismatch => json!({ "new_password": "Passwords do not match." }),
            AppError::UsernameMismatch => json!({ "username": "Wrong username." }),
        };
        HttpResponse::build(status).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`; everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> AppError {
        AppError::DatabaseError(format!("Migration failed: {}", error))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.into())
    }
}

/// JWT processing failures are authentication failures.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
