//! Favorite (user <-> work) membership.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::work::WorkResponse;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: String,
    pub design_id: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteRequest {
    pub design_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesResponse {
    pub design_ids: Vec<String>,
    pub works: Vec<WorkResponse>,
}
