use std::path::Path;

use actix_web::{get, web, HttpResponse, Responder};

use crate::{
    blob::{BlobStore, PROFILE_PICTURES},
    error::AppError,
};

/// Public profile pictures. Attachments are only reachable through the
/// authenticated attachment routes.
#[get("/media/{handle:.*}")]
pub async fn media(
    blobs: web::Data<dyn BlobStore>,
    handle: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let handle = handle.into_inner();
    let is_picture = handle
        .strip_prefix(PROFILE_PICTURES)
        .map_or(false, |rest| rest.starts_with('/'));
    if !is_picture {
        return Err(AppError::NotFound("File not found".into()));
    }

    let bytes = blobs.fetch(&handle).await?;
    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&handle))
        .body(bytes))
}

fn content_type_for(handle: &str) -> &'static str {
    let extension = Path::new(handle)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
