use actix_web::{
    delete, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web, HttpResponse, Responder,
};

use crate::{auth::Identity, error::AppError, repository::TaskRepository};

#[get("/{id}/")]
pub async fn get_attachment(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let attachment = repo.get_attachment(&identity, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(attachment))
}

/// Raw attachment bytes, served with the content type recorded on upload.
#[get("/{id}/content/")]
pub async fn attachment_content(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let (attachment, bytes) = repo.attachment_content(&identity, id.into_inner()).await?;
    let content_type = attachment
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(attachment.file_name)],
        })
        .body(bytes))
}

#[delete("/{id}/")]
pub async fn delete_attachment(
    repo: web::Data<TaskRepository>,
    identity: Identity,
    id: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    repo.delete_attachment(&identity, id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
