pub mod access;
mod analytics;
pub mod auth;
pub mod error;
mod favorites;
mod meta;
pub mod metrics;
mod offers;
mod pros;
pub mod rate_limit;
mod references;
mod uploads;
pub mod validation;
mod works;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Multipart framing allowance on top of the configured file size
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login and registration (stricter rate limit)
    let credential_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let auth_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ))
        .merge(credential_routes);

    // Public browsing
    let public_routes = Router::new()
        .route("/works", get(works::list_works))
        // Must precede /works/:id
        .route("/works/batch", get(works::batch_works))
        .route("/works/:id", get(works::get_work))
        .route("/references/:id", get(references::get_reference))
        .route("/pros/:id", get(pros::get_pro))
        .route("/geo/nearest", get(meta::nearest))
        .route("/geo/cities", get(meta::list_cities))
        .route("/meta/tags", get(meta::list_tags))
        .route("/i18n", get(meta::negotiated_catalog))
        .route("/i18n/:locale", get(meta::locale_catalog))
        .route("/access", get(access::check_access))
        .route("/analytics/events", post(analytics::track_event));

    let client_routes = Router::new()
        .route("/references", get(references::list_my_references))
        .route("/references", post(references::create_reference))
        .route("/references/:id", patch(references::update_reference_status))
        .route("/references/:id/offers", get(offers::list_reference_offers))
        .route("/offers/:id", patch(offers::update_offer_status));

    let pro_routes = Router::new()
        .route("/works", post(works::create_work))
        .route("/works/:id", delete(works::delete_work))
        .route("/references", get(references::list_open_references))
        .route("/references/:id/offers", post(offers::create_offer))
        .route("/offers", get(offers::list_my_offers))
        .route("/profile", get(pros::get_my_profile))
        .route("/profile", put(pros::update_my_profile));

    let admin_routes = Router::new()
        .route("/users", get(pros::list_users))
        .route("/pros/:id/verify", patch(pros::verify_pro))
        .route("/analytics", get(analytics::analytics_summary));

    let favorite_routes = Router::new()
        .route("/", get(favorites::list_favorites))
        .route("/", post(favorites::add_favorite))
        .route("/:design_id", delete(favorites::remove_favorite));

    let upload_routes = Router::new()
        .route("/", post(uploads::upload_image))
        .layer(DefaultBodyLimit::max(
            state.config.uploads.max_bytes + UPLOAD_BODY_SLACK,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_upload,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .nest("/client", client_routes)
        .nest("/pro", pro_routes)
        .nest("/admin", admin_routes)
        .nest("/favorites", favorite_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api/auth", auth_routes)
        .nest("/api/uploads", upload_routes)
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(state.config.upload_dir()))
        // Role checks see the full request path
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access::route_access_middleware,
        ))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
