//! Closed vocabularies shared across models: cities and style tags.

use serde::{Deserialize, Serialize};

/// A city the marketplace operates in
#[derive(Debug, Clone, Copy, Serialize)]
pub struct City {
    pub slug: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const CITIES: [City; 10] = [
    City { slug: "warszawa", name: "Warszawa", lat: 52.2297, lon: 21.0122 },
    City { slug: "krakow", name: "Kraków", lat: 50.0647, lon: 19.9450 },
    City { slug: "wroclaw", name: "Wrocław", lat: 51.1079, lon: 17.0385 },
    City { slug: "gdansk", name: "Gdańsk", lat: 54.3520, lon: 18.6466 },
    City { slug: "poznan", name: "Poznań", lat: 52.4064, lon: 16.9252 },
    City { slug: "lodz", name: "Łódź", lat: 51.7592, lon: 19.4560 },
    City { slug: "katowice", name: "Katowice", lat: 50.2649, lon: 19.0238 },
    City { slug: "szczecin", name: "Szczecin", lat: 53.4285, lon: 14.5528 },
    City { slug: "lublin", name: "Lublin", lat: 51.2465, lon: 22.5684 },
    City { slug: "bialystok", name: "Białystok", lat: 53.1325, lon: 23.1688 },
];

pub const TAGS: [&str; 15] = [
    "french",
    "ombre",
    "chrome",
    "minimal",
    "floral",
    "geometric",
    "glitter",
    "matte",
    "nail-art",
    "gel",
    "acrylic",
    "pastel",
    "neon",
    "wedding",
    "seasonal",
];

/// Maximum number of tags on a single work or reference
pub const MAX_TAGS: usize = 8;

pub fn find_city(slug: &str) -> Option<&'static City> {
    CITIES.iter().find(|c| c.slug == slug)
}

pub fn is_known_city(slug: &str) -> bool {
    find_city(slug).is_some()
}

pub fn is_known_tag(tag: &str) -> bool {
    TAGS.contains(&tag)
}

/// Lowercase, trim and de-duplicate tags while keeping their first-seen order
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = tag.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// Helper to parse a tags JSON column from the database
pub fn parse_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Helper to serialize tags to JSON for the database
pub fn serialize_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Pagination parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabularies() {
        assert!(is_known_city("krakow"));
        assert!(!is_known_city("berlin"));
        assert!(is_known_tag("chrome"));
        assert!(!is_known_tag("Chrome"));
        assert_eq!(find_city("gdansk").map(|c| c.name), Some("Gdańsk"));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " French ".to_string(),
            "french".to_string(),
            "".to_string(),
            "Matte".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["french", "matte"]);
    }

    #[test]
    fn test_tags_column() {
        let tags = vec!["gel".to_string(), "neon".to_string()];
        let json = serialize_tags(&tags);
        assert_eq!(json, r#"["gel","neon"]"#);
        assert_eq!(parse_tags(&json), tags);
        assert!(parse_tags("not json").is_empty());
    }

    #[test]
    fn test_page_bounds() {
        let page = Page { limit: Some(1000), offset: Some(-5) };
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 0);
        assert_eq!(Page::default().limit(), 50);
    }
}
