//! User accounts: registration, login, profile, password and account deletion.

use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::auth::{hash_password, verify_password, Identity};
use crate::blob::{self, SharedBlobStore, Upload, PROFILE_PICTURES};
use crate::error::{AppError, FieldErrors};
use crate::models::{PasswordChange, ProfileChanges, SignupInput, User, UserProfile};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, full_name, profile_picture, created_at";
const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    blobs: SharedBlobStore,
    hash_cost: u32,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, blobs: SharedBlobStore, hash_cost: u32) -> Self {
        Self {
            pool,
            blobs,
            hash_cost,
        }
    }

    /// Client-facing view of `user`, with the picture handle turned into a URL.
    pub fn profile_view(&self, user: &User) -> UserProfile {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            profile_picture: user
                .profile_picture
                .as_deref()
                .map(|handle| self.blobs.url(handle)),
        }
    }

    /// Creates an account. Username and email must be unused.
    pub async fn register(
        &self,
        input: SignupInput,
        picture: Option<Upload>,
    ) -> Result<User, AppError> {
        input.validate()?;
        let username = input.username.unwrap_or_default();
        let email = input.email.unwrap_or_default();
        let password = input.password.unwrap_or_default();
        let full_name = input.full_name.unwrap_or_default();

        self.ensure_unique(Some(&username), Some(&email), None)
            .await?
            .into_result()?;

        let password_hash = hash_password(&password, self.hash_cost)?;

        let picture_handle = match &picture {
            Some(upload) => Some(
                self.blobs
                    .store(PROFILE_PICTURES, &upload.file_name, &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let sql = format!(
            "INSERT INTO users (username, email, password_hash, full_name, profile_picture, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            USER_COLUMNS
        );
        let inserted = sqlx::query_as::<_, User>(&sql)
            .bind(&username)
            .bind(&email)
            .bind(&password_hash)
            .bind(&full_name)
            .bind(&picture_handle)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(user) => {
                log::info!("Registered user {} ({})", user.username, user.id);
                Ok(user)
            }
            Err(e) => {
                if let Some(handle) = &picture_handle {
                    blob::release(self.blobs.as_ref(), handle).await;
                }
                Err(map_unique_violation(e))
            }
        }
    }

    /// Checks `username`/`password` against the stored hash. No side effects.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        let Some(user) = self.find_by_username(username).await? else {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Identity::new(user.id))
        } else {
            Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()))
        }
    }

    /// The caller's own record. A token for a deleted account is rejected.
    pub async fn profile(&self, who: &Identity) -> Result<User, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(who.user_id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User account no longer exists".into()))
    }

    pub async fn account_exists(&self, user_id: i64) -> Result<bool, AppError> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Applies the fields present in `changes`.
    ///
    /// Picture handling: `delete_picture` clears the current picture and ignores any
    /// upload; otherwise an upload replaces the current picture.
    pub async fn update_profile(
        &self,
        who: &Identity,
        changes: ProfileChanges,
    ) -> Result<User, AppError> {
        let mut user = self.profile(who).await?;

        let mut errors = match changes.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => e.into(),
        };
        errors.merge(
            self.ensure_unique(
                changes.username.as_deref(),
                changes.email.as_deref(),
                Some(user.id),
            )
            .await?,
        );
        errors.into_result()?;

        let previous_picture = user.profile_picture.clone();
        let mut new_picture = None;
        if changes.delete_picture {
            user.profile_picture = None;
        } else if let Some(upload) = &changes.profile_picture {
            let handle = self
                .blobs
                .store(PROFILE_PICTURES, &upload.file_name, &upload.bytes)
                .await?;
            user.profile_picture = Some(handle.clone());
            new_picture = Some(handle);
        }

        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }

        let sql = format!(
            "UPDATE users SET username = ?, email = ?, full_name = ?, profile_picture = ? \
             WHERE id = ? RETURNING {}",
            USER_COLUMNS
        );
        let saved = sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.profile_picture)
            .bind(user.id)
            .fetch_one(&self.pool)
            .await;

        let saved = match saved {
            Ok(saved) => saved,
            Err(e) => {
                if let Some(handle) = &new_picture {
                    blob::release(self.blobs.as_ref(), handle).await;
                }
                return Err(map_unique_violation(e));
            }
        };

        if let Some(old) = previous_picture {
            if saved.profile_picture.as_deref() != Some(old.as_str()) {
                blob::release(self.blobs.as_ref(), &old).await;
            }
        }
        Ok(saved)
    }

    /// Verifies the current password, then the confirmation, then stores the new hash.
    pub async fn change_password(
        &self,
        who: &Identity,
        change: PasswordChange,
    ) -> Result<(), AppError> {
        change.validate()?;
        let user = self.profile(who).await?;

        let old_password = change.old_password.unwrap_or_default();
        if !verify_password(&old_password, &user.password_hash)? {
            return Err(AppError::WrongPassword);
        }
        let new_password = change.new_password.unwrap_or_default();
        if change.confirm_new_password.as_deref() != Some(new_password.as_str()) {
            return Err(AppError::PasswordMismatch);
        }

        let password_hash = hash_password(&new_password, self.hash_cost)?;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        log::info!("Password changed for user {}", user.id);
        Ok(())
    }

    /// Deletes the caller's account and, by cascade, all their tasks.
    ///
    /// `confirmed_username` must equal the caller's username.
    pub async fn delete_account(
        &self,
        who: &Identity,
        confirmed_username: &str,
    ) -> Result<(), AppError> {
        let user = self.profile(who).await?;
        if confirmed_username != user.username {
            return Err(AppError::UsernameMismatch);
        }

        let mut tx = self.pool.begin().await?;
        let attachment_files: Vec<(String,)> = sqlx::query_as(
            "SELECT a.file FROM attachments a JOIN tasks t ON t.id = a.task_id WHERE t.user_id = ?",
        )
        .bind(user.id)
        .fetch_all(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("Deleted account {} ({})", user.username, user.id);

        for (handle,) in attachment_files {
            blob::release(self.blobs.as_ref(), &handle).await;
        }
        if let Some(handle) = user.profile_picture {
            blob::release(self.blobs.as_ref(), &handle).await;
        }
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Reports which of `username`/`email` already belong to someone other than `except`.
    async fn ensure_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<i64>,
    ) -> Result<FieldErrors, AppError> {
        let except = except.unwrap_or(-1);
        let mut errors = FieldErrors::new();

        if let Some(username) = username {
            let taken: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != ?")
                    .bind(username)
                    .bind(except)
                    .fetch_optional(&self.pool)
                    .await?;
            if taken.is_some() {
                errors.add("username", "A user with that username already exists.");
            }
        }
        if let Some(email) = email {
            let taken: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM users WHERE email = ? AND id != ?")
                    .bind(email)
                    .bind(except)
                    .fetch_optional(&self.pool)
                    .await?;
            if taken.is_some() {
                errors.add("email", "A user with that email already exists.");
            }
        }
        Ok(errors)
    }
}

/// Turns a lost uniqueness race into the same field error the pre-check reports.
fn map_unique_violation(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            let message = db.message();
            if message.contains("users.username") {
                return AppError::validation("username", "A user with that username already exists.");
            }
            if message.contains("users.email") {
                return AppError::validation("email", "A user with that email already exists.");
            }
        }
    }
    error.into()
}
