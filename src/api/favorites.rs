//! Favorites: signed-in users bookmark works (designs).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{AddFavoriteRequest, Favorite, FavoritesResponse, User, Work};
use crate::AppState;

use super::error::ApiError;

/// GET /api/favorites
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<FavoritesResponse>, ApiError> {
    let favorites = sqlx::query_as::<_, Favorite>(
        "SELECT * FROM favorites WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let works = sqlx::query_as::<_, Work>(
        r#"
        SELECT works.* FROM favorites
        JOIN works ON works.id = favorites.design_id
        WHERE favorites.user_id = ?
        ORDER BY favorites.created_at DESC
        "#,
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(FavoritesResponse {
        design_ids: favorites.into_iter().map(|f| f.design_id).collect(),
        works: works.into_iter().map(Work::to_response).collect(),
    }))
}

/// POST /api/favorites
///
/// Idempotent: 201 when added, 200 when it was already a favorite.
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<Favorite>), ApiError> {
    let design_id = req.design_id.trim().to_string();
    if design_id.is_empty() {
        return Err(ApiError::validation_field("designId", "designId is required"));
    }

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM works WHERE id = ?")
        .bind(&design_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::not_found("Work not found"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO favorites (user_id, design_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&design_id)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let status = if result.rows_affected() > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    let favorite = sqlx::query_as::<_, Favorite>(
        "SELECT * FROM favorites WHERE user_id = ? AND design_id = ?",
    )
    .bind(&user.id)
    .bind(&design_id)
    .fetch_one(&state.db)
    .await?;

    Ok((status, Json(favorite)))
}

/// DELETE /api/favorites/:design_id
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(design_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND design_id = ?")
        .bind(&user.id)
        .bind(&design_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Favorite not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
