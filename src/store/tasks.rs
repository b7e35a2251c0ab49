//! Plain persistence for tasks, subtasks and attachments.
//!
//! Nothing here knows who is asking. Lookups are by primary key or by owner id as
//! an ordinary data filter; authorization happens in [`crate::repository`].

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::AppError;
use crate::models::{Attachment, NewAttachment, NewTask, Subtask, Task, TaskQuery};

const TASK_COLUMNS: &str =
    "id, user_id, title, notes, due_date, remind_me, complete, tags, created_at, updated_at";
const SUBTASK_COLUMNS: &str = "id, task_id, title, completed";
const ATTACHMENT_COLUMNS: &str = "id, task_id, file, file_name, content_type, size, uploaded_at";
/// Bound ids per `IN (...)` list, well under SQLite's host parameter limit.
const IDS_PER_QUERY: usize = 500;

#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Tasks

    pub async fn insert_task(&self, owner_id: i64, task: &NewTask) -> Result<Task, AppError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO tasks (user_id, title, notes, due_date, remind_me, complete, tags, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            TASK_COLUMNS
        );
        let created = sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .bind(&task.title)
            .bind(&task.notes)
            .bind(task.due_date)
            .bind(task.remind_me)
            .bind(task.complete)
            .bind(&task.tags)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    pub async fn find_task(&self, id: i64) -> Result<Option<Task>, AppError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    /// Tasks of `owner_id` matching `query`, oldest first.
    pub async fn tasks_by_owner(
        &self,
        owner_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM tasks WHERE user_id = ",
            TASK_COLUMNS
        ));
        builder.push_bind(owner_id);

        if let Some(complete) = query.complete {
            builder.push(" AND complete = ").push_bind(complete);
        }
        if let Some(search) = non_blank(query.search.as_deref()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR notes LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(tag) = non_blank(query.tag.as_deref()) {
            builder
                .push(" AND tags LIKE ")
                .push_bind(like_pattern(tag))
                .push(" ESCAPE '\\'");
        }
        builder.push(" ORDER BY id");

        let tasks = builder
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    /// Writes the mutable columns of `task`. The owner column is never touched.
    ///
    /// Returns `None` when the row no longer exists.
    pub async fn save_task(&self, task: &Task) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET title = ?, notes = ?, due_date = ?, remind_me = ?, complete = ?, tags = ?, updated_at = ? \
             WHERE id = ? RETURNING {}",
            TASK_COLUMNS
        );
        let saved = sqlx::query_as::<_, Task>(&sql)
            .bind(&task.title)
            .bind(&task.notes)
            .bind(task.due_date)
            .bind(task.remind_me)
            .bind(task.complete)
            .bind(&task.tags)
            .bind(Utc::now())
            .bind(task.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(saved)
    }

    /// Deletes a task together with its subtasks and attachments.
    ///
    /// Returns the blob handles of the removed attachments, or `None` if the task
    /// did not exist.
    pub async fn delete_task(&self, id: i64) -> Result<Option<Vec<String>>, AppError> {
        let mut tx = self.pool.begin().await?;

        let handles: Vec<(String,)> = sqlx::query_as("SELECT file FROM attachments WHERE task_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(handles.into_iter().map(|(file,)| file).collect()))
    }

    // Subtasks

    pub async fn insert_subtask(
        &self,
        task_id: i64,
        title: &str,
        completed: bool,
    ) -> Result<Subtask, AppError> {
        let sql = format!(
            "INSERT INTO subtasks (task_id, title, completed) VALUES (?, ?, ?) RETURNING {}",
            SUBTASK_COLUMNS
        );
        let subtask = sqlx::query_as::<_, Subtask>(&sql)
            .bind(task_id)
            .bind(title)
            .bind(completed)
            .fetch_one(&self.pool)
            .await?;
        Ok(subtask)
    }

    pub async fn find_subtask(&self, id: i64) -> Result<Option<Subtask>, AppError> {
        let sql = format!("SELECT {} FROM subtasks WHERE id = ?", SUBTASK_COLUMNS);
        let subtask = sqlx::query_as::<_, Subtask>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(subtask)
    }

    pub async fn subtasks_of_tasks(&self, task_ids: &[i64]) -> Result<Vec<Subtask>, AppError> {
        let mut subtasks = Vec::new();
        for chunk in task_ids.chunks(IDS_PER_QUERY) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {} FROM subtasks WHERE task_id IN (",
                SUBTASK_COLUMNS
            ));
            push_ids(&mut builder, chunk);
            builder.push(")");

            subtasks.extend(
                builder
                    .build_query_as::<Subtask>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }
        subtasks.sort_by_key(|subtask| subtask.id);
        Ok(subtasks)
    }

    /// Subtasks whose parent task belongs to `owner_id`, optionally for one task only.
    pub async fn subtasks_by_owner(
        &self,
        owner_id: i64,
        task_id: Option<i64>,
    ) -> Result<Vec<Subtask>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT s.id, s.task_id, s.title, s.completed FROM subtasks s \
             JOIN tasks t ON t.id = s.task_id WHERE t.user_id = ",
        );
        builder.push_bind(owner_id);
        if let Some(task_id) = task_id {
            builder.push(" AND s.task_id = ").push_bind(task_id);
        }
        builder.push(" ORDER BY s.id");

        let subtasks = builder
            .build_query_as::<Subtask>()
            .fetch_all(&self.pool)
            .await?;
        Ok(subtasks)
    }

    pub async fn save_subtask(&self, subtask: &Subtask) -> Result<Option<Subtask>, AppError> {
        let sql = format!(
            "UPDATE subtasks SET title = ?, completed = ? WHERE id = ? RETURNING {}",
            SUBTASK_COLUMNS
        );
        let saved = sqlx::query_as::<_, Subtask>(&sql)
            .bind(&subtask.title)
            .bind(subtask.completed)
            .bind(subtask.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(saved)
    }

    pub async fn delete_subtask(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM subtasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Attachments

    pub async fn insert_attachment(
        &self,
        task_id: i64,
        attachment: &NewAttachment,
    ) -> Result<Attachment, AppError> {
        let sql = format!(
            "INSERT INTO attachments (task_id, file, file_name, content_type, size, uploaded_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            ATTACHMENT_COLUMNS
        );
        let created = sqlx::query_as::<_, Attachment>(&sql)
            .bind(task_id)
            .bind(&attachment.file)
            .bind(&attachment.file_name)
            .bind(&attachment.content_type)
            .bind(attachment.size)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    pub async fn find_attachment(&self, id: i64) -> Result<Option<Attachment>, AppError> {
        let sql = format!("SELECT {} FROM attachments WHERE id = ?", ATTACHMENT_COLUMNS);
        let attachment = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attachment)
    }

    pub async fn attachments_of_tasks(&self, task_ids: &[i64]) -> Result<Vec<Attachment>, AppError> {
        let mut attachments = Vec::new();
        for chunk in task_ids.chunks(IDS_PER_QUERY) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {} FROM attachments WHERE task_id IN (",
                ATTACHMENT_COLUMNS
            ));
            push_ids(&mut builder, chunk);
            builder.push(")");

            attachments.extend(
                builder
                    .build_query_as::<Attachment>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }
        attachments.sort_by_key(|attachment| attachment.id);
        Ok(attachments)
    }

    pub async fn delete_attachment(&self, id: i64) -> Result<Option<Attachment>, AppError> {
        let sql = format!(
            "DELETE FROM attachments WHERE id = ? RETURNING {}",
            ATTACHMENT_COLUMNS
        );
        let removed = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(removed)
    }
}

fn push_ids(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
