//! Client-side analytics events.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;

use crate::db::{
    record_event, summarize_events, AnalyticsSummary, AnalyticsSummaryQuery, Role,
    TrackEventRequest, User,
};
use crate::i18n::negotiate_locale;
use crate::AppState;

use super::auth::{require_role, OptionalUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::metrics::{event_metric_label, ANALYTICS_EVENTS_TOTAL};
use super::validation::{validate_event_name, validate_text};

/// Serialized props larger than this are rejected
const MAX_PROPS_BYTES: usize = 4096;

#[derive(Debug, Serialize)]
pub struct TrackEventResponse {
    pub id: String,
}

/// POST /api/analytics/events
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    headers: HeaderMap,
    Json(req): Json<TrackEventRequest>,
) -> Result<(StatusCode, Json<TrackEventResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_event_name(&req.name))
        .check("path", validate_text(&req.path, "Path", 512));
    if let Some(props) = &req.props {
        if !props.is_object() {
            errors.add("props", "Props must be a JSON object");
        } else if props.to_string().len() > MAX_PROPS_BYTES {
            errors.add("props", format!("Props are too large (max {} bytes)", MAX_PROPS_BYTES));
        }
    }
    errors.finish()?;

    let accept = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let locale = negotiate_locale(
        accept,
        &state.config.i18n.locales,
        &state.config.i18n.default_locale,
    );

    let id = record_event(
        &state.db,
        &req.name,
        req.path.as_deref(),
        user.as_ref().map(|u| u.id.as_str()),
        Some(&locale),
        req.props.as_ref(),
    )
    .await?;

    counter!(ANALYTICS_EVENTS_TOTAL, "name" => event_metric_label(&req.name)).increment(1);

    Ok((StatusCode::ACCEPTED, Json(TrackEventResponse { id })))
}

/// GET /api/admin/analytics?since=
pub async fn analytics_summary(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<AnalyticsSummaryQuery>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    require_role(&user, &[Role::Admin])?;

    let since = query
        .since
        .as_deref()
        .map(|since| {
            chrono::DateTime::parse_from_rfc3339(since)
                .map(|s| s.with_timezone(&chrono::Utc))
                .map_err(|_| ApiError::validation_field("since", "Must be an RFC 3339 timestamp"))
        })
        .transpose()?;

    Ok(Json(summarize_events(&state.db, since).await?))
}
