//! Portfolio works: public browsing and pro-owned publishing.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    normalize_tags, serialize_tags, BatchWorksQuery, CreateWorkRequest, Role, User, Work,
    WorkQuery, WorkResponse,
};
use crate::AppState;

use super::auth::require_role;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_city, validate_image_url, validate_tag, validate_tags, validate_text};

/// Upper bound on ids accepted by the batch endpoint
const MAX_BATCH_IDS: usize = 50;

/// Cache policy for the batch endpoint; works are immutable once published
const BATCH_CACHE_CONTROL: &str = "public, max-age=60, stale-while-revalidate=300";

/// GET /api/works?city=&proId=&tag=&limit=&offset=
pub async fn list_works(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkQuery>,
) -> Result<Json<Vec<WorkResponse>>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(city) = &query.city {
        errors.check("city", validate_city(city));
    }
    if let Some(tag) = &query.tag {
        errors.check("tag", validate_tag(tag));
    }
    errors.finish()?;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(city) = &query.city {
        conditions.push("city = ?");
        bindings.push(city.clone());
    }

    if let Some(pro_id) = &query.pro_id {
        conditions.push("pro_id = ?");
        bindings.push(pro_id.clone());
    }

    if let Some(tag) = &query.tag {
        conditions.push("EXISTS (SELECT 1 FROM json_each(works.tags) WHERE json_each.value = ?)");
        bindings.push(tag.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT * FROM works {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut q = sqlx::query_as::<_, Work>(&sql);
    for binding in &bindings {
        q = q.bind(binding);
    }
    let page = crate::db::Page {
        limit: query.limit,
        offset: query.offset,
    };
    let works = q
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.db)
        .await?;

    Ok(Json(works.into_iter().map(Work::to_response).collect()))
}

/// GET /api/works/:id
pub async fn get_work(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkResponse>, ApiError> {
    let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Work not found"))?;

    Ok(Json(work.to_response()))
}

/// GET /api/works/batch?designIds=a,b,c
///
/// Rows come back in database order, not request order; unknown ids are skipped.
pub async fn batch_works(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchWorksQuery>,
) -> Result<Response, ApiError> {
    let ids = query.ids();
    if ids.len() > MAX_BATCH_IDS {
        return Err(ApiError::validation_field(
            "designIds",
            format!("Too many ids (max {})", MAX_BATCH_IDS),
        ));
    }

    let works = if ids.is_empty() {
        Vec::new()
    } else {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM works WHERE id IN ({})", placeholders);
        let mut q = sqlx::query_as::<_, Work>(&sql);
        for id in &ids {
            q = q.bind(id);
        }
        q.fetch_all(&state.db).await?
    };

    let body: Vec<WorkResponse> = works.into_iter().map(Work::to_response).collect();
    let mut response = Json(body).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(BATCH_CACHE_CONTROL),
    );
    Ok(response)
}

fn validate_create_request(req: &CreateWorkRequest, remote_hosts: &[String]) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("imageUrl", validate_image_url(&req.image_url, remote_hosts))
        .check("city", validate_city(&req.city))
        .check("tags", validate_tags(&req.tags))
        .check("caption", validate_text(&req.caption, "Caption", 300));
    errors.finish()
}

/// POST /api/pro/works
pub async fn create_work(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateWorkRequest>,
) -> Result<(StatusCode, Json<WorkResponse>), ApiError> {
    require_role(&user, &[Role::Pro])?;

    let req = CreateWorkRequest {
        tags: normalize_tags(&req.tags),
        caption: req.caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        ..req
    };
    validate_create_request(&req, &state.config.uploads.remote_image_hosts)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO works (id, pro_id, image_url, caption, city, tags, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.image_url)
    .bind(&req.caption)
    .bind(&req.city)
    .bind(serialize_tags(&req.tags))
    .bind(&now)
    .execute(&state.db)
    .await?;

    let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(work_id = %work.id, pro_id = %user.id, "Work published");

    Ok((StatusCode::CREATED, Json(work.to_response())))
}

/// DELETE /api/pro/works/:id
pub async fn delete_work(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let work = sqlx::query_as::<_, Work>("SELECT * FROM works WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Work not found"))?;

    if work.pro_id != user.id && user.role_enum() != Role::Admin {
        return Err(ApiError::forbidden("Only the owner can delete this work"));
    }

    sqlx::query("DELETE FROM works WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(work_id = %id, user_id = %user.id, "Work deleted");

    Ok(StatusCode::NO_CONTENT)
}
