//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Marketplace counters shared by the handlers

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const OFFERS_TOTAL: &str = "offers_total";
pub const ANALYTICS_EVENTS_TOTAL: &str = "analytics_events_total";
pub const USERS_TOTAL: &str = "users_total";
pub const WORKS_TOTAL: &str = "works_total";
pub const OPEN_REFERENCES: &str = "open_references";

/// Event names that get their own `analytics_events_total` series
const LABELED_EVENT_NAMES: &[&str] = &[
    "page_view",
    "search",
    "work.view",
    "favorite.add",
    "favorite.remove",
    "reference.create",
    "offer.create",
    "offer.accept",
    "upload",
];

/// Label for an analytics event counter; unlisted names share `other`
pub fn event_metric_label(name: &str) -> &'static str {
    LABELED_EVENT_NAMES
        .iter()
        .find(|known| **known == name)
        .copied()
        .unwrap_or("other")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Call once during startup; a second install fails.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        OFFERS_TOTAL,
        "Offer submissions and status changes by resulting status"
    );
    describe_counter!(ANALYTICS_EVENTS_TOTAL, "Analytics events received by name");
    describe_gauge!(USERS_TOTAL, "Registered users by role");
    describe_gauge!(WORKS_TOTAL, "Published portfolio works");
    describe_gauge!(OPEN_REFERENCES, "Client references still open for offers");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Refresh gauges from the database before rendering.
async fn update_gauge_metrics(state: &AppState) {
    if let Ok(rows) = sqlx::query_as::<_, (String, i64)>(
        "SELECT role, COUNT(*) FROM users GROUP BY role",
    )
    .fetch_all(&state.db)
    .await
    {
        for (role, count) in rows {
            gauge!(USERS_TOTAL, "role" => role).set(count as f64);
        }
    }

    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM works")
        .fetch_one(&state.db)
        .await
    {
        gauge!(WORKS_TOTAL).set(count as f64);
    }

    if let Ok(count) = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM client_references WHERE status = 'open'",
    )
    .fetch_one(&state.db)
    .await
    {
        gauge!(OPEN_REFERENCES).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Matched route template keeps label cardinality bounded (/api/works/:id)
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        // Prometheus naming conventions
        assert!(HTTP_REQUESTS_TOTAL.ends_with("_total"));
        assert!(OFFERS_TOTAL.ends_with("_total"));
        assert!(ANALYTICS_EVENTS_TOTAL.ends_with("_total"));
        assert!(HTTP_REQUEST_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_event_metric_label_is_bounded() {
        assert_eq!(event_metric_label("page_view"), "page_view");
        assert_eq!(event_metric_label("favorite.add"), "favorite.add");
        assert_eq!(event_metric_label("e1"), "other");
        assert_eq!(event_metric_label("campaign.spring_2026"), "other");
    }
}
