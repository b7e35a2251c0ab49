//! Blob storage for profile pictures and task attachments.
//!
//! Content is addressed by an opaque handle chosen by the store on write. The
//! database keeps only handles; callers sequence blob writes and releases around
//! their database mutations.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

pub const PROFILE_PICTURES: &str = "profile_pictures";
pub const ATTACHMENTS: &str = "attachments";

/// An uploaded file as received from a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persists `bytes` under a fresh handle inside `prefix` and returns the handle.
    async fn store(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// Reads back the content of `handle`. Unknown handles are `NotFound`.
    async fn fetch(&self, handle: &str) -> Result<Vec<u8>, AppError>;

    /// Removes `handle`. Removing an unknown handle succeeds.
    async fn delete(&self, handle: &str) -> Result<(), AppError>;

    /// Public URL a client can use to reach `handle`.
    fn url(&self, handle: &str) -> String;
}

pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Best-effort removal once the owning database row is gone. Failures are logged only.
pub async fn release(blobs: &dyn BlobStore, handle: &str) {
    if let Err(e) = blobs.delete(handle).await {
        log::warn!("Failed to release blob {}: {}", handle, e);
    }
}

pub(crate) fn new_handle(prefix: &str, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        prefix,
        Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(file_name: &str) -> String {
    // Browsers may send a full client-side path.
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Stores blobs as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn path_for(&self, handle: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(handle);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if handle.is_empty() || !is_plain {
            return Err(AppError::NotFound("File not found".into()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let handle = new_handle(prefix, file_name);
        let path = self.path_for(&handle)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(handle)
    }

    async fn fetch(&self, handle: &str) -> Result<Vec<u8>, AppError> {
        let path = self.path_for(handle)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound("File not found".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, handle: &str) -> Result<(), AppError> {
        let path = self.path_for(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, handle: &str) -> String {
        format!("{}{}", self.base_url, handle)
    }
}

/// Keeps blobs in memory. Used by tests and throwaway setups.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.lock().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, prefix: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let handle = new_handle(prefix, file_name);
        self.lock().insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    async fn fetch(&self, handle: &str) -> Result<Vec<u8>, AppError> {
        self.lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| AppError::NotFound("File not found".into()))
    }

    async fn delete(&self, handle: &str) -> Result<(), AppError> {
        self.lock().remove(handle);
        Ok(())
    }

    fn url(&self, handle: &str) -> String {
        format!("/media/{}", handle)
    }
}
