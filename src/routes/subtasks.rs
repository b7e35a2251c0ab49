use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use serde::Deserialize;

use crate::{
    auth::Identity,
    error::AppError,
    models::{NewSubtask, SubtaskPayload},
    repository::TaskRepository,
};

#[derive(Debug, Deserialize)]
pub struct SubtaskQuery {
    /// Only subtasks of this task.
    pub task: Option<i64>,
}

#[get("/")]
pub async fn list_subtasks(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    query: web::Query<SubtaskQuery>,
) -> Result<impl Responder, AppError> {
    let subtasks = repo.list_subtasks(&identity, query.task).await?;
    Ok(HttpResponse::Ok().json(subtasks))
}

#[post("/")]
pub async fn create_subtask(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    body: web::Json<NewSubtask>,
) -> Result<impl Responder, AppError> {
    let subtask = repo.create_subtask(&identity, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(subtask))
}

#[get("/{id}/")]
pub async fn get_subtask(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let subtask = repo.get_subtask(&identity, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(subtask))
}

#[put("/{id}/")]
pub async fn replace_subtask(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
    body: web::Json<SubtaskPayload>,
) -> Result<impl Responder, AppError> {
    let subtask = repo
        .update_subtask(&identity, id.into_inner(), body.into_inner(), false)
        .await?;
    Ok(HttpResponse::Ok().json(subtask))
}

#[patch("/{id}/")]
pub async fn patch_subtask(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
    body: web::Json<SubtaskPayload>,
) -> Result<impl Responder, AppError> {
    let subtask = repo
        .update_subtask(&identity, id.into_inner(), body.into_inner(), true)
        .await?;
    Ok(HttpResponse::Ok().json(subtask))
}

#[delete("/{id}/")]
pub async fn delete_subtask(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    repo.delete_subtask(&identity, id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
