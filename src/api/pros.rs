//! Pro profiles and the admin views over users.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::db::{
    ProProfile, ProProfileResponse, ProPublic, Role, UpdateProProfileRequest, User,
    UserListQuery, UserResponse, VerifyProRequest,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_instagram, validate_optional_price, validate_text};

/// Fetch a profile, creating an empty one for pros registered before profiles existed
async fn load_profile(state: &AppState, user_id: &str) -> Result<ProProfile, ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("INSERT OR IGNORE INTO pro_profiles (user_id, updated_at) VALUES (?, ?)")
        .bind(user_id)
        .bind(&now)
        .execute(&state.db)
        .await?;

    let profile = sqlx::query_as::<_, ProProfile>("SELECT * FROM pro_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&state.db)
        .await?;

    Ok(profile)
}

async fn find_pro(state: &AppState, id: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND role = ?")
        .bind(id)
        .bind(Role::Pro.as_str())
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Pro not found"))
}

/// GET /api/pros/:id
pub async fn get_pro(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProPublic>, ApiError> {
    let pro = find_pro(&state, &id).await?;
    let profile = load_profile(&state, &pro.id).await?;

    let work_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM works WHERE pro_id = ?")
        .bind(&pro.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(ProPublic {
        id: pro.id,
        name: pro.name,
        city: pro.city,
        profile: profile.into(),
        work_count,
    }))
}

/// GET /api/pro/profile
pub async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ProProfileResponse>, ApiError> {
    require_role(&user, &[Role::Pro])?;
    let profile = load_profile(&state, &user.id).await?;
    Ok(Json(profile.into()))
}

/// PUT /api/pro/profile
///
/// Omitted fields keep their stored value.
pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<UpdateProProfileRequest>,
) -> Result<Json<ProProfileResponse>, ApiError> {
    require_role(&user, &[Role::Pro])?;

    let bio = req.bio.map(|b| b.trim().to_string());
    let instagram = req
        .instagram
        .map(|h| h.trim().trim_start_matches('@').to_string());

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("bio", validate_text(&bio, "Bio", 500))
        .check("instagram", validate_instagram(&instagram))
        .check("minPricePln", validate_optional_price(&req.min_price_pln));
    errors.finish()?;

    // Make sure the row exists before the partial update
    load_profile(&state, &user.id).await?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        UPDATE pro_profiles SET
            bio = COALESCE(?, bio),
            instagram = COALESCE(?, instagram),
            min_price_pln = COALESCE(?, min_price_pln),
            updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(&bio)
    .bind(&instagram)
    .bind(req.min_price_pln)
    .bind(&now)
    .bind(&user.id)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %user.id, "Pro profile updated");

    let profile = load_profile(&state, &user.id).await?;
    Ok(Json(profile.into()))
}

/// PATCH /api/admin/pros/:id/verify
pub async fn verify_pro(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<VerifyProRequest>,
) -> Result<Json<ProProfileResponse>, ApiError> {
    require_role(&user, &[Role::Admin])?;

    let pro = find_pro(&state, &id).await?;
    load_profile(&state, &pro.id).await?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE pro_profiles SET is_verified = ?, updated_at = ? WHERE user_id = ?")
        .bind(req.is_verified)
        .bind(&now)
        .bind(&pro.id)
        .execute(&state.db)
        .await?;

    tracing::info!(
        pro_id = %pro.id,
        admin_id = %user.id,
        verified = req.is_verified,
        "Pro verification changed"
    );

    let profile = load_profile(&state, &pro.id).await?;
    Ok(Json(profile.into()))
}

/// GET /api/admin/users?role=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_role(&user, &[Role::Admin])?;

    let users = match query.role {
        Some(role) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE role = ? ORDER BY created_at DESC")
                .bind(role.as_str())
                .fetch_all(&state.db)
                .await?
        }
        None => {
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
