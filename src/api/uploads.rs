//! Image uploads stored on local disk and served from `/uploads`.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::BytesMut;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{Upload, UploadResponse, User};
use crate::AppState;

use super::error::ApiError;

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Missing 'file' field")]
    MissingFile,
    #[error("Empty file")]
    EmptyFile,
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("File is too large (max {max} bytes)")]
    TooLarge { max: usize },
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::MissingFile | UploadError::EmptyFile => {
                ApiError::validation_field(FILE_FIELD, err.to_string())
            }
            UploadError::UnsupportedType(_) => ApiError::unsupported_media_type(err.to_string()),
            UploadError::TooLarge { .. } => ApiError::payload_too_large(err.to_string()),
            UploadError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                ApiError::payload_too_large("Request body is too large")
            }
            UploadError::Multipart(e) => ApiError::bad_request(e.body_text()),
            UploadError::Io(e) => {
                tracing::error!(error = %e, "Failed to write upload");
                ApiError::internal("Failed to store file")
            }
        }
    }
}

/// File extension for an accepted image content type
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// Declared content type, or a guess from the file name when the part has none
fn resolve_content_type(declared: Option<&str>, file_name: Option<&str>) -> Option<String> {
    declared
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(|ct| ct.to_lowercase())
        .or_else(|| {
            file_name
                .and_then(|name| mime_guess::from_path(name).first_raw())
                .map(str::to_string)
        })
}

/// POST /api/uploads
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: User,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let config = &state.config.uploads;

    let mut field = loop {
        match multipart.next_field().await.map_err(UploadError::from)? {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(UploadError::MissingFile.into()),
        }
    };

    let content_type = resolve_content_type(field.content_type(), field.file_name())
        .ok_or_else(|| UploadError::UnsupportedType("unknown".to_string()))?;
    if !config.allowed_content_types.iter().any(|t| t == &content_type) {
        return Err(UploadError::UnsupportedType(content_type).into());
    }

    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(UploadError::from)? {
        if data.len() + chunk.len() > config.max_bytes {
            return Err(UploadError::TooLarge {
                max: config.max_bytes,
            }
            .into());
        }
        data.extend_from_slice(&chunk);
    }
    if data.is_empty() {
        return Err(UploadError::EmptyFile.into());
    }

    let id = Uuid::new_v4().to_string();
    let file_name = format!("{}.{}", id, extension_for(&content_type));
    let dir = state.config.upload_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(UploadError::from)?;
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(UploadError::from)?;

    let url = format!("/uploads/{}", file_name);
    let now = chrono::Utc::now().to_rfc3339();
    let size_bytes = data.len() as i64;

    let inserted = sqlx::query(
        r#"
        INSERT INTO uploads (id, user_id, file_name, content_type, size_bytes, url, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&file_name)
    .bind(&content_type)
    .bind(size_bytes)
    .bind(&url)
    .bind(&now)
    .execute(&state.db)
    .await;

    if let Err(e) = inserted {
        // No row points at the file
        if let Err(remove_err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove orphaned upload");
        }
        return Err(e.into());
    }

    tracing::info!(upload_id = %id, user_id = %user.id, size_bytes, content_type = %content_type, "Image uploaded");

    let upload = sqlx::query_as::<_, Upload>("SELECT * FROM uploads WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(upload))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_images() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
    }

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(
            resolve_content_type(Some("IMAGE/PNG"), None).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), Some("nails.jpg")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(resolve_content_type(None, None), None);
    }

    #[test]
    fn test_upload_error_status() {
        let err: ApiError = UploadError::TooLarge { max: 10 }.into();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let err: ApiError = UploadError::UnsupportedType("text/plain".to_string()).into();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err: ApiError = UploadError::MissingFile.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
