use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::crypto::{generate_token, hash_password, hash_token, verify_password};
use crate::db::{LoginRequest, LoginResponse, RegisterRequest, Role, User, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_email, validate_name, validate_optional_city, validate_password, validate_phone,
};

/// Extract the session token from `Authorization: Bearer` or the session cookie
fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Look up the user owning a live session for `token`
pub async fn user_for_token(pool: &sqlx::SqlitePool, token: &str) -> Result<Option<User>, ApiError> {
    let token_hash = hash_token(token);
    let now = chrono::Utc::now().to_rfc3339();

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT users.* FROM sessions
        JOIN users ON users.id = sessions.user_id
        WHERE sessions.token_hash = ? AND sessions.expires_at > ?
        "#,
    )
    .bind(&token_hash)
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Resolve the signed-in user from request headers, if any
pub async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    match extract_token(headers, &state.config.auth.cookie_name) {
        Some(token) => user_for_token(&state.db, &token).await,
        None => Ok(None),
    }
}

/// Extractor for the current authenticated user; rejects with 401
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(state, &parts.headers)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Sign in to continue"))
    }
}

/// Extractor for handlers that behave differently for signed-in callers
pub struct OptionalUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(resolve_user(state, &parts.headers).await?))
    }
}

/// Require one of `roles`; admins always pass
pub fn require_role(user: &User, roles: &[Role]) -> Result<(), ApiError> {
    let role = user.role_enum();
    if role == Role::Admin || roles.contains(&role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Your account cannot perform this action"))
    }
}

/// Insert a session for `user_id` and return the raw token
async fn create_session(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(state.config.auth.session_days))
        .to_rfc3339();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(token)
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let auth = &state.config.auth;
    Cookie::build((auth.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(auth.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(auth.session_days))
        .build()
}

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&req.name))
        .check("email", validate_email(&req.email))
        .check("password", validate_password(&req.password))
        .check("phone", validate_phone(&req.phone))
        .check("city", validate_optional_city(&req.city));
    errors.finish()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<LoginResponse>), ApiError> {
    if req.role == Role::Admin {
        return Err(ApiError::forbidden("Admin accounts cannot be registered"));
    }

    let req = RegisterRequest {
        email: req.email.trim().to_lowercase(),
        name: req.name.trim().to_string(),
        phone: req.phone.filter(|p| !p.is_empty()),
        city: req.city.filter(|c| !c.is_empty()),
        ..req
    };
    validate_register_request(&req)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create account")
    })?;

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, phone, city, role, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.city)
    .bind(req.role.as_str())
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::conflict("An account with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    // Pros always have a profile row
    if req.role == Role::Pro {
        sqlx::query("INSERT INTO pro_profiles (user_id, updated_at) VALUES (?, ?)")
            .bind(&id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = %req.role, "User registered");

    let token = create_session(&state, &user.id).await?;
    let jar = jar.add(session_cookie(&state, token.clone()));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(LoginResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let email = request.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_session(&state, &user.id).await?;
    let jar = jar.add(session_cookie(&state, token.clone()));

    tracing::info!(user_id = %user.id, "User signed in");

    Ok((
        jar,
        Json(LoginResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), ApiError> {
    if let Some(token) = extract_token(&headers, &state.config.auth.cookie_name) {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(&token))
            .execute(&state.db)
            .await?;
    }

    let jar = jar.remove(Cookie::build((state.config.auth.cookie_name.clone(), "")).path("/"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Delete expired sessions; returns how many were removed
pub async fn purge_expired_sessions(pool: &sqlx::SqlitePool) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(&now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
