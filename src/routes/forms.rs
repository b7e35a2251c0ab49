use std::collections::HashMap;

use actix_multipart::{Field, Multipart};
use futures::TryStreamExt;

use crate::blob::Upload;
use crate::error::AppError;

/// Upper bound for a single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// A `multipart/form-data` body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, Upload>,
}

impl FormData {
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

fn malformed(e: actix_multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", e))
}

/// Drains `payload`. Parts carrying a filename become files, the rest text.
pub async fn read_form(mut payload: Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let file_name = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .map(str::to_owned);

        match file_name {
            Some(file_name) => {
                let content_type = field.content_type().map(|mime| mime.to_string());
                let bytes = read_field(&mut field, &name, MAX_UPLOAD_BYTES).await?;
                form.files.insert(
                    name,
                    Upload {
                        file_name,
                        content_type,
                        bytes,
                    },
                );
            }
            None => {
                let bytes = read_field(&mut field, &name, MAX_TEXT_FIELD_BYTES).await?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| AppError::validation(&name, "Field is not valid UTF-8."))?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}

async fn read_field(field: &mut Field, name: &str, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::validation(
                name,
                format!("Upload exceeds the limit of {} bytes.", limit),
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
