//! Portfolio work models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::parse_tags;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Work {
    pub id: String,
    pub pro_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub city: String,
    /// JSON array of tag slugs
    pub tags: String,
    pub created_at: String,
}

impl Work {
    pub fn to_response(self) -> WorkResponse {
        WorkResponse {
            tags: parse_tags(&self.tags),
            id: self.id,
            pro_id: self.pro_id,
            image_url: self.image_url,
            caption: self.caption,
            city: self.city,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkResponse {
    pub id: String,
    pub pro_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub city: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// Filters for the public works listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkQuery {
    pub city: Option<String>,
    pub pro_id: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `designIds` is a comma-separated list of work ids
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWorksQuery {
    #[serde(default)]
    pub design_ids: String,
}

impl BatchWorksQuery {
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.design_ids.split(',').map(str::trim) {
            if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
        ids
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkRequest {
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub city: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ids_parsing() {
        let q = BatchWorksQuery {
            design_ids: " a, b,,a ,c ".to_string(),
        };
        assert_eq!(q.ids(), vec!["a", "b", "c"]);
        assert!(BatchWorksQuery::default().ids().is_empty());
    }

    #[test]
    fn test_work_response_parses_tags() {
        let work = Work {
            id: "w1".to_string(),
            pro_id: "p1".to_string(),
            image_url: "/uploads/x.png".to_string(),
            caption: None,
            city: "poznan".to_string(),
            tags: r#"["ombre","pastel"]"#.to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
        };
        let resp = work.to_response();
        assert_eq!(resp.tags, vec!["ombre", "pastel"]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["proId"], "p1");
        assert_eq!(json["imageUrl"], "/uploads/x.png");
    }
}
