//! Role-based route protection.
//!
//! The same table guards API prefixes (`/api/pro/...`) and the page paths the
//! front end asks about through `GET /api/access`.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::Role;
use crate::i18n::{negotiate_locale, translate};
use crate::AppState;

use super::auth::{resolve_user, OptionalUser};
use super::error::ApiError;

/// Who may open a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Public,
    SignedIn,
    Role(Role),
}

/// Ordered prefix table; the first matching prefix wins
const PROTECTED_PREFIXES: [(&str, Requirement); 8] = [
    ("/api/admin", Requirement::Role(Role::Admin)),
    ("/admin", Requirement::Role(Role::Admin)),
    ("/api/pro", Requirement::Role(Role::Pro)),
    ("/pro", Requirement::Role(Role::Pro)),
    ("/api/client", Requirement::Role(Role::Client)),
    ("/client", Requirement::Role(Role::Client)),
    ("/api/favorites", Requirement::SignedIn),
    ("/account", Requirement::SignedIn),
];

/// `path` equals `prefix` or continues it with a new segment
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

pub fn requirement_for(path: &str) -> Requirement {
    PROTECTED_PREFIXES
        .iter()
        .find(|(prefix, _)| matches_prefix(path, prefix))
        .map(|(_, req)| *req)
        .unwrap_or(Requirement::Public)
}

/// Whether a caller with `role` (None = anonymous) may open `path`.
/// Admins may open every route.
pub fn can_access_route(role: Option<Role>, path: &str) -> bool {
    match (requirement_for(path), role) {
        (Requirement::Public, _) => true,
        (_, None) => false,
        (Requirement::SignedIn, Some(_)) => true,
        (Requirement::Role(_), Some(Role::Admin)) => true,
        (Requirement::Role(required), Some(actual)) => required == actual,
    }
}

/// Middleware enforcing `can_access_route` on every request it wraps
pub async fn route_access_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let requirement = requirement_for(&path);

    if requirement == Requirement::Public {
        return Ok(next.run(request).await);
    }

    let user = resolve_user(&state, request.headers()).await?;
    let role = user.as_ref().map(|u| u.role_enum());

    if can_access_route(role, &path) {
        return Ok(next.run(request).await);
    }

    let i18n = &state.config.i18n;
    let locale = negotiate_locale(
        request
            .headers()
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
        &i18n.locales,
        &i18n.default_locale,
    );

    match role {
        None => Err(ApiError::unauthorized(translate(
            &locale,
            &i18n.default_locale,
            "errors.sign_in_required",
        ))),
        Some(role) => {
            tracing::debug!(path = %path, role = %role, "Route access denied");
            Err(ApiError::forbidden(translate(
                &locale,
                &i18n.default_locale,
                "errors.forbidden",
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub path: String,
    pub allowed: bool,
    pub required: Requirement,
}

/// GET /api/access?path=/pro/works
pub async fn check_access(
    OptionalUser(user): OptionalUser,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let role = user.as_ref().map(|u| u.role_enum());
    Json(AccessResponse {
        allowed: can_access_route(role, &query.path),
        required: requirement_for(&query.path),
        path: query.path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        for path in ["/", "/works", "/api/works", "/api/works/batch", "/api/references/abc"] {
            assert!(can_access_route(None, path), "{} should be public", path);
        }
    }

    #[test]
    fn test_role_routes() {
        assert!(can_access_route(Some(Role::Pro), "/api/pro/works"));
        assert!(!can_access_route(Some(Role::Client), "/api/pro/works"));
        assert!(!can_access_route(None, "/pro"));

        assert!(can_access_route(Some(Role::Client), "/client/references"));
        assert!(!can_access_route(Some(Role::Pro), "/api/client/offers/1"));

        assert!(!can_access_route(Some(Role::Pro), "/admin"));
        assert!(!can_access_route(Some(Role::Client), "/api/admin/users"));
    }

    #[test]
    fn test_admin_can_access_everything() {
        for path in ["/api/pro/works", "/client", "/api/admin/users", "/account"] {
            assert!(can_access_route(Some(Role::Admin), path));
        }
    }

    #[test]
    fn test_signed_in_routes() {
        assert!(!can_access_route(None, "/api/favorites"));
        assert!(can_access_route(Some(Role::Client), "/api/favorites/w1"));
        assert!(can_access_route(Some(Role::Pro), "/account"));
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        assert_eq!(requirement_for("/products"), Requirement::Public);
        assert_eq!(requirement_for("/professional"), Requirement::Public);
        assert_eq!(requirement_for("/administrator"), Requirement::Public);
        assert_eq!(requirement_for("/pro?tab=works"), Requirement::Role(Role::Pro));
        assert_eq!(requirement_for("/api/pro"), Requirement::Role(Role::Pro));
    }
}
