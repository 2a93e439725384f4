//! Database seeders for bootstrap data

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::crypto::hash_password;

/// Create the configured admin account if no user owns that email yet.
///
/// The email is stored trimmed and lowercased, the form login looks up.
/// Returns `true` when a new admin was inserted.
pub async fn ensure_admin_user(pool: &SqlitePool, email: &str, password: &str) -> Result<bool> {
    let email = email.trim().to_lowercase();
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(false);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to hash admin password")?;

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, role, password_hash, created_at, updated_at)
        VALUES (?, 'Administrator', ?, 'admin', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!(email = %email, "Created admin user");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();

        assert!(ensure_admin_user(&pool, "admin@example.com", "admin-pass-1")
            .await
            .unwrap());
        assert!(!ensure_admin_user(&pool, "admin@example.com", "admin-pass-1")
            .await
            .unwrap());

        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE email = ?")
            .bind("admin@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(role, "admin");
    }

    #[tokio::test]
    async fn test_ensure_admin_user_normalizes_email() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();

        assert!(ensure_admin_user(&pool, " Admin@NailMatch.pl ", "admin-pass-1")
            .await
            .unwrap());
        assert!(!ensure_admin_user(&pool, "admin@nailmatch.pl", "admin-pass-1")
            .await
            .unwrap());

        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(email, "admin@nailmatch.pl");
    }
}
