//! Owner-scoped access to tasks, subtasks and attachments.
//!
//! This is the only way request handlers reach task data. Every method takes the
//! caller's [`Identity`] and narrows the underlying [`TaskStore`] lookups to rows
//! in the caller's ownership chain: tasks by `user_id`, subtasks and attachments
//! through their parent task. Anything outside that chain is reported as
//! `NotFound`, exactly like a row that does not exist.

use std::collections::HashMap;

use validator::Validate;

use crate::auth::Identity;
use crate::blob::{self, SharedBlobStore, Upload, ATTACHMENTS};
use crate::error::AppError;
use crate::models::{
    Attachment, NewAttachment, NewSubtask, Subtask, SubtaskPayload, Task, TaskPayload, TaskQuery,
    TaskView,
};
use crate::store::TaskStore;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

fn subtask_not_found() -> AppError {
    AppError::NotFound("Subtask not found".into())
}

fn attachment_not_found() -> AppError {
    AppError::NotFound("Attachment not found".into())
}

#[derive(Clone)]
pub struct TaskRepository {
    store: TaskStore,
    blobs: SharedBlobStore,
}

impl TaskRepository {
    pub fn new(store: TaskStore, blobs: SharedBlobStore) -> Self {
        Self { store, blobs }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    // Tasks

    pub async fn list_tasks(
        &self,
        who: &Identity,
        query: &TaskQuery,
    ) -> Result<Vec<TaskView>, AppError> {
        let tasks = self.store.tasks_by_owner(who.user_id(), query).await?;
        self.views(tasks).await
    }

    /// Creates a task owned by `who`. The owner never comes from the payload.
    pub async fn create_task(
        &self,
        who: &Identity,
        payload: TaskPayload,
    ) -> Result<TaskView, AppError> {
        payload.validate(false)?;
        let task = self
            .store
            .insert_task(who.user_id(), &payload.into_new_task())
            .await?;
        log::debug!("User {} created task {}", who.user_id(), task.id);
        Ok(TaskView {
            task,
            subtasks: Vec::new(),
            attachments: Vec::new(),
        })
    }

    pub async fn get_task(&self, who: &Identity, id: i64) -> Result<TaskView, AppError> {
        let task = self.owned_task(who, id).await?;
        self.view(task).await
    }

    /// Updates the fields present in `payload`. With `partial == false` the
    /// payload must also carry every required field.
    pub async fn update_task(
        &self,
        who: &Identity,
        id: i64,
        payload: TaskPayload,
        partial: bool,
    ) -> Result<TaskView, AppError> {
        let mut task = self.owned_task(who, id).await?;
        payload.validate(partial)?;
        payload.apply_to(&mut task);

        let saved = self
            .store
            .save_task(&task)
            .await?
            .ok_or_else(task_not_found)?;
        log::debug!("User {} updated task {}", who.user_id(), saved.id);
        self.view(saved).await
    }

    /// Deletes a task with its subtasks and attachments, then releases the blobs.
    pub async fn delete_task(&self, who: &Identity, id: i64) -> Result<(), AppError> {
        self.owned_task(who, id).await?;
        let released = self.store.delete_task(id).await?.ok_or_else(task_not_found)?;
        log::debug!("User {} deleted task {}", who.user_id(), id);
        for handle in released {
            blob::release(self.blobs.as_ref(), &handle).await;
        }
        Ok(())
    }

    // Subtasks

    /// The caller's subtasks, optionally only those of `task_id`.
    pub async fn list_subtasks(
        &self,
        who: &Identity,
        task_id: Option<i64>,
    ) -> Result<Vec<Subtask>, AppError> {
        self.store.subtasks_by_owner(who.user_id(), task_id).await
    }

    /// Adds a subtask to one of the caller's tasks.
    pub async fn create_subtask(
        &self,
        who: &Identity,
        input: NewSubtask,
    ) -> Result<Subtask, AppError> {
        input.validate()?;
        let task_id = input.task.ok_or_else(task_not_found)?;
        let task = self.owned_task(who, task_id).await?;
        let title = input.title.unwrap_or_default();
        self.store
            .insert_subtask(task.id, &title, input.completed)
            .await
    }

    pub async fn get_subtask(&self, who: &Identity, id: i64) -> Result<Subtask, AppError> {
        self.owned_subtask(who, id).await
    }

    pub async fn update_subtask(
        &self,
        who: &Identity,
        id: i64,
        payload: SubtaskPayload,
        partial: bool,
    ) -> Result<Subtask, AppError> {
        let mut subtask = self.owned_subtask(who, id).await?;
        payload.validate(partial)?;
        payload.apply_to(&mut subtask);
        self.store
            .save_subtask(&subtask)
            .await?
            .ok_or_else(subtask_not_found)
    }

    pub async fn delete_subtask(&self, who: &Identity, id: i64) -> Result<(), AppError> {
        self.owned_subtask(who, id).await?;
        if self.store.delete_subtask(id).await? {
            Ok(())
        } else {
            Err(subtask_not_found())
        }
    }

    // Attachments

    pub async fn list_attachments(
        &self,
        who: &Identity,
        task_id: i64,
    ) -> Result<Vec<Attachment>, AppError> {
        let task = self.owned_task(who, task_id).await?;
        self.store.attachments_of_tasks(&[task.id]).await
    }

    /// Stores `upload` and attaches it to one of the caller's tasks.
    ///
    /// The blob is written first and released again if the row cannot be inserted.
    pub async fn add_attachment(
        &self,
        who: &Identity,
        task_id: i64,
        upload: Upload,
    ) -> Result<Attachment, AppError> {
        let task = self.owned_task(who, task_id).await?;
        let handle = self
            .blobs
            .store(ATTACHMENTS, &upload.file_name, &upload.bytes)
            .await?;

        let record = NewAttachment {
            file: handle.clone(),
            file_name: upload.file_name,
            content_type: upload.content_type,
            size: upload.bytes.len() as i64,
        };
        match self.store.insert_attachment(task.id, &record).await {
            Ok(attachment) => Ok(attachment),
            Err(e) => {
                blob::release(self.blobs.as_ref(), &handle).await;
                Err(e)
            }
        }
    }

    pub async fn get_attachment(&self, who: &Identity, id: i64) -> Result<Attachment, AppError> {
        self.owned_attachment(who, id).await
    }

    /// The attachment row together with its content.
    pub async fn attachment_content(
        &self,
        who: &Identity,
        id: i64,
    ) -> Result<(Attachment, Vec<u8>), AppError> {
        let attachment = self.owned_attachment(who, id).await?;
        let bytes = self.blobs.fetch(&attachment.file).await?;
        Ok((attachment, bytes))
    }

    pub async fn delete_attachment(&self, who: &Identity, id: i64) -> Result<(), AppError> {
        self.owned_attachment(who, id).await?;
        let removed = self
            .store
            .delete_attachment(id)
            .await?
            .ok_or_else(attachment_not_found)?;
        blob::release(self.blobs.as_ref(), &removed.file).await;
        Ok(())
    }

    // Ownership chain

    async fn owned_task(&self, who: &Identity, id: i64) -> Result<Task, AppError> {
        self.store
            .find_task(id)
            .await?
            .filter(|task| task.user_id == who.user_id())
            .ok_or_else(task_not_found)
    }

    async fn owned_subtask(&self, who: &Identity, id: i64) -> Result<Subtask, AppError> {
        let subtask = self
            .store
            .find_subtask(id)
            .await?
            .ok_or_else(subtask_not_found)?;
        self.owned_task(who, subtask.task_id)
            .await
            .map_err(|_| subtask_not_found())?;
        Ok(subtask)
    }

    async fn owned_attachment(&self, who: &Identity, id: i64) -> Result<Attachment, AppError> {
        let attachment = self
            .store
            .find_attachment(id)
            .await?
            .ok_or_else(attachment_not_found)?;
        self.owned_task(who, attachment.task_id)
            .await
            .map_err(|_| attachment_not_found())?;
        Ok(attachment)
    }

    async fn view(&self, task: Task) -> Result<TaskView, AppError> {
        let mut views = self.views(vec![task]).await?;
        views.pop().ok_or_else(task_not_found)
    }

    async fn views(&self, tasks: Vec<Task>) -> Result<Vec<TaskView>, AppError> {
        let ids: Vec<i64> = tasks.iter().map(|task| task.id).collect();

        let mut subtasks: HashMap<i64, Vec<Subtask>> = HashMap::new();
        for subtask in self.store.subtasks_of_tasks(&ids).await? {
            subtasks.entry(subtask.task_id).or_default().push(subtask);
        }
        let mut attachments: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in self.store.attachments_of_tasks(&ids).await? {
            attachments
                .entry(attachment.task_id)
                .or_default()
                .push(attachment);
        }

        Ok(tasks
            .into_iter()
            .map(|task| TaskView {
                subtasks: subtasks.remove(&task.id).unwrap_or_default(),
                attachments: attachments.remove(&task.id).unwrap_or_default(),
                task,
            })
            .collect())
    }
}
