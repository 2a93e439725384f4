//! Client references: clients post them, pros browse the open ones.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    normalize_tags, serialize_tags, ClientReference, CreateReferenceRequest, Page,
    ReferenceQuery, ReferenceResponse, ReferenceStatus, Role, UpdateStatusRequest, User,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_city, validate_image_url, validate_tag, validate_tags, validate_text};

pub(super) async fn find_reference(
    state: &AppState,
    id: &str,
) -> Result<ClientReference, ApiError> {
    sqlx::query_as::<_, ClientReference>("SELECT * FROM client_references WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Reference not found"))
}

/// Owners and admins may manage a reference
pub(super) fn ensure_reference_owner(reference: &ClientReference, user: &User) -> Result<(), ApiError> {
    if reference.client_id == user.id || user.role_enum() == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the owner can manage this reference"))
    }
}

/// POST /api/client/references
pub async fn create_reference(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateReferenceRequest>,
) -> Result<(StatusCode, Json<ReferenceResponse>), ApiError> {
    require_role(&user, &[Role::Client])?;

    let tags = normalize_tags(&req.tags);
    let note = req.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check(
            "imageUrl",
            validate_image_url(&req.image_url, &state.config.uploads.remote_image_hosts),
        )
        .check("city", validate_city(&req.city))
        .check("tags", validate_tags(&tags))
        .check("note", validate_text(&note, "Note", 1000));
    errors.finish()?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO client_references (id, client_id, image_url, city, tags, note, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.image_url)
    .bind(&req.city)
    .bind(serialize_tags(&tags))
    .bind(&note)
    .bind(ReferenceStatus::Open.as_str())
    .bind(&now)
    .execute(&state.db)
    .await?;

    let reference = find_reference(&state, &id).await?;

    tracing::info!(reference_id = %id, client_id = %user.id, "Reference created");

    Ok((StatusCode::CREATED, Json(reference.to_response())))
}

/// GET /api/client/references
pub async fn list_my_references(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<ReferenceResponse>>, ApiError> {
    let references = sqlx::query_as::<_, ClientReference>(
        "SELECT * FROM client_references WHERE client_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(references.into_iter().map(ClientReference::to_response).collect()))
}

/// GET /api/pro/references?city=&tag=
///
/// Only open references are listed; newest first.
pub async fn list_open_references(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReferenceQuery>,
) -> Result<Json<Vec<ReferenceResponse>>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(city) = &query.city {
        errors.check("city", validate_city(city));
    }
    if let Some(tag) = &query.tag {
        errors.check("tag", validate_tag(tag));
    }
    errors.finish()?;

    let mut conditions = vec!["status = ?"];
    let mut bindings: Vec<String> = vec![ReferenceStatus::Open.as_str().to_string()];

    if let Some(city) = &query.city {
        conditions.push("city = ?");
        bindings.push(city.clone());
    }

    if let Some(tag) = &query.tag {
        conditions.push(
            "EXISTS (SELECT 1 FROM json_each(client_references.tags) WHERE json_each.value = ?)",
        );
        bindings.push(tag.clone());
    }

    let sql = format!(
        "SELECT * FROM client_references WHERE {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        conditions.join(" AND ")
    );
    let mut q = sqlx::query_as::<_, ClientReference>(&sql);
    for binding in &bindings {
        q = q.bind(binding);
    }
    let page = Page {
        limit: query.limit,
        offset: query.offset,
    };
    let references = q
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.db)
        .await?;

    Ok(Json(references.into_iter().map(ClientReference::to_response).collect()))
}

/// GET /api/references/:id
pub async fn get_reference(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let reference = find_reference(&state, &id).await?;
    Ok(Json(reference.to_response()))
}

/// PATCH /api/client/references/:id
///
/// Any whitelisted status may follow any other.
pub async fn update_reference_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let status: ReferenceStatus = req
        .status
        .parse()
        .map_err(|e: String| ApiError::validation_field("status", e))?;

    let reference = find_reference(&state, &id).await?;
    ensure_reference_owner(&reference, &user)?;

    sqlx::query("UPDATE client_references SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(
        reference_id = %id,
        from = %reference.status,
        to = %status,
        "Reference status updated"
    );

    let reference = find_reference(&state, &id).await?;
    Ok(Json(reference.to_response()))
}
