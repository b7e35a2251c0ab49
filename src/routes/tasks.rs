use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use serde_json::json;

use crate::{
    auth::Identity,
    error::AppError,
    models::{TaskPayload, TaskQuery},
    repository::TaskRepository,
    routes::forms,
};

/// Lists the caller's tasks, each with its subtasks and attachments.
///
/// ## Query Parameters:
/// - `complete` (optional): `true` or `false`.
/// - `search` (optional): substring of the title or notes, case-insensitive.
/// - `tag` (optional): substring of the tag string.
#[get("/")]
pub async fn list_tasks(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = repo.list_tasks(&identity, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a task owned by the caller. Any owner field in the body is ignored.
#[post("/")]
pub async fn create_task(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    body: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    let task = repo.create_task(&identity, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(task))
}

#[get("/{id}/")]
pub async fn get_task(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let task = repo.get_task(&identity, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[put("/{id}/")]
pub async fn replace_task(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
    body: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    update(&repo, &identity, id.into_inner(), body.into_inner(), false).await
}

#[patch("/{id}/")]
pub async fn patch_task(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
    body: web::Json<TaskPayload>,
) -> Result<impl Responder, AppError> {
    update(&repo, &identity, id.into_inner(), body.into_inner(), true).await
}

async fn update(
    repo: &TaskRepository,
    identity: &Identity,
    id: i64,
    payload: TaskPayload,
    partial: bool,
) -> Result<HttpResponse, AppError> {
    let task = repo.update_task(identity, id, payload, partial).await?;
    Ok(HttpResponse::Ok().json(task))
}

#[delete("/{id}/")]
pub async fn delete_task(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    repo.delete_task(&identity, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "detail": "Task deleted successfully." })))
}

#[get("/{id}/attachments/")]
pub async fn list_attachments(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let attachments = repo.list_attachments(&identity, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(attachments))
}

/// Uploads the multipart `file` part as a new attachment of the task.
#[post("/{id}/attachments/")]
pub async fn upload_attachment(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut form = forms::read_form(payload).await?;
    let upload = form
        .take_file("file")
        .ok_or_else(|| AppError::validation("file", "No file was submitted."))?;

    let attachment = repo
        .add_attachment(&identity, id.into_inner(), upload)
        .await?;
    Ok(HttpResponse::Created().json(attachment))
}
