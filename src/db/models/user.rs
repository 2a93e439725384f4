//! User, session and pro profile models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Marketplace roles. Closed set; users never change role through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Posts references and accepts offers
    Client,
    /// Publishes works and bids on references
    Pro,
    /// Moderation and verification
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Pro => "pro",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "pro" => Ok(Role::Pro),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub role: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Role as an enum; rows are constrained by a CHECK so unknown values
    /// only appear on hand-edited databases and are treated as clients.
    pub fn role_enum(&self) -> Role {
        self.role.parse().unwrap_or(Role::Client)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            city: user.city,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Query for the admin user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProProfile {
    pub user_id: String,
    pub bio: Option<String>,
    pub instagram: Option<String>,
    pub min_price_pln: Option<i64>,
    pub is_verified: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProProfileResponse {
    pub user_id: String,
    pub bio: Option<String>,
    pub instagram: Option<String>,
    pub min_price_pln: Option<i64>,
    pub is_verified: bool,
}

impl From<ProProfile> for ProProfileResponse {
    fn from(p: ProProfile) -> Self {
        Self {
            user_id: p.user_id,
            bio: p.bio,
            instagram: p.instagram,
            min_price_pln: p.min_price_pln,
            is_verified: p.is_verified,
        }
    }
}

/// Public view of a pro: profile joined with the owning user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProPublic {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub profile: ProProfileResponse,
    pub work_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProProfileRequest {
    pub bio: Option<String>,
    pub instagram: Option<String>,
    pub min_price_pln: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProRequest {
    pub is_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("pro".parse::<Role>().unwrap(), Role::Pro);
        assert_eq!("CLIENT".parse::<Role>().unwrap(), Role::Client);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_role_serde() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"name":"Ala","email":"ala@example.com","password":"secret123","role":"pro"}"#,
        )
        .unwrap();
        assert_eq!(req.role, Role::Pro);
        assert!(req.city.is_none());

        let bad = serde_json::from_str::<RegisterRequest>(
            r#"{"name":"Ala","email":"a@b.c","password":"x","role":"superuser"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_user_response_hides_password() {
        let user = User {
            id: "u1".to_string(),
            name: "Ala".to_string(),
            email: "ala@example.com".to_string(),
            phone: None,
            city: Some("krakow".to_string()),
            role: "client".to_string(),
            password_hash: "hash".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(user.role_enum(), Role::Client);
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
    }
}
