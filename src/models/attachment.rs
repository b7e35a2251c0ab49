use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A file attached to a task. The content lives in the blob store under `file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: i64,
    #[serde(rename = "task")]
    pub task_id: i64,
    /// Blob handle.
    pub file: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: i64,
    /// Set once on upload.
    pub uploaded_at: DateTime<Utc>,
}

/// Column values for an attachment about to be inserted.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: i64,
}
