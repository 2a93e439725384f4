//! Uploaded image records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Upload {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
}

impl From<Upload> for UploadResponse {
    fn from(u: Upload) -> Self {
        Self {
            id: u.id,
            url: u.url,
            content_type: u.content_type,
            size_bytes: u.size_bytes,
        }
    }
}
