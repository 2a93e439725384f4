//! Client reference models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::parse_tags;

/// Lifecycle of a client reference. Any value may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStatus {
    Open,
    Matched,
    Closed,
}

impl ReferenceStatus {
    pub const ALL: [ReferenceStatus; 3] = [
        ReferenceStatus::Open,
        ReferenceStatus::Matched,
        ReferenceStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceStatus::Open => "open",
            ReferenceStatus::Matched => "matched",
            ReferenceStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ReferenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReferenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid status. Must be one of: {}",
                    Self::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientReference {
    pub id: String,
    pub client_id: String,
    pub image_url: String,
    pub city: String,
    /// JSON array of tag slugs
    pub tags: String,
    pub note: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl ClientReference {
    pub fn to_response(self) -> ReferenceResponse {
        ReferenceResponse {
            tags: parse_tags(&self.tags),
            id: self.id,
            client_id: self.client_id,
            image_url: self.image_url,
            city: self.city,
            note: self.note,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceResponse {
    pub id: String,
    pub client_id: String,
    pub image_url: String,
    pub city: String,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceQuery {
    pub city: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferenceRequest {
    pub image_url: String,
    pub city: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Status arrives as a raw string so that an unknown value is reported as a
/// validation error rather than a body-shape rejection.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_status_whitelist() {
        assert_eq!("open".parse::<ReferenceStatus>(), Ok(ReferenceStatus::Open));
        assert_eq!("matched".parse::<ReferenceStatus>(), Ok(ReferenceStatus::Matched));
        assert_eq!("closed".parse::<ReferenceStatus>(), Ok(ReferenceStatus::Closed));

        let err = "archived".parse::<ReferenceStatus>().unwrap_err();
        assert!(err.contains("open, matched, closed"));
        assert!("OPEN".parse::<ReferenceStatus>().is_err());
    }
}
