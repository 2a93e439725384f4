//! Message catalogs and locale negotiation.
//!
//! Catalogs are flat `key -> message` JSON objects embedded at build time
//! from `locales/*.json`.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub type Catalog = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum I18nError {
    #[error("Unknown locale: {0}")]
    UnknownLocale(String),
}

const EMBEDDED: [(&str, &str); 2] = [
    ("pl", include_str!("../../locales/pl.json")),
    ("en", include_str!("../../locales/en.json")),
];

lazy_static! {
    static ref CATALOGS: HashMap<&'static str, Catalog> = EMBEDDED
        .iter()
        .map(|(locale, json)| {
            // Embedded files are checked by `test_catalogs_parse`
            let catalog: Catalog = serde_json::from_str(json).unwrap_or_default();
            (*locale, catalog)
        })
        .collect();
}

/// Locales with an embedded catalog
pub fn available_locales() -> Vec<&'static str> {
    let mut locales: Vec<&'static str> = CATALOGS.keys().copied().collect();
    locales.sort_unstable();
    locales
}

pub fn catalog(locale: &str) -> Result<&'static Catalog, I18nError> {
    CATALOGS
        .get(locale)
        .ok_or_else(|| I18nError::UnknownLocale(locale.to_string()))
}

/// Look up `key`, falling back to `fallback_locale` and finally the key itself
pub fn translate(locale: &str, fallback_locale: &str, key: &str) -> String {
    [locale, fallback_locale]
        .iter()
        .filter_map(|l| CATALOGS.get(l))
        .find_map(|c| c.get(key))
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

/// Pick the best supported locale for an `Accept-Language` header.
///
/// Entries are ranked by q-value (default 1.0, `q=0` excluded); ties keep
/// header order. A tag matches on exact value first, then on its primary
/// subtag (`en-GB` -> `en`). Returns `default` when nothing matches.
pub fn negotiate_locale(accept_language: Option<&str>, supported: &[String], default: &str) -> String {
    let header = match accept_language {
        Some(h) if !h.trim().is_empty() => h,
        _ => return default.to_string(),
    };

    let mut ranked: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let tag = parts.next()?.to_lowercase();
            if tag.is_empty() {
                return None;
            }
            let q = parts
                .find_map(|p| p.strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            (q > 0.0).then_some((tag, q))
        })
        .collect();

    // Stable sort keeps header order for equal q-values
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (tag, _) in &ranked {
        if tag == "*" {
            return default.to_string();
        }
        if let Some(found) = supported.iter().find(|s| s.eq_ignore_ascii_case(tag)) {
            return found.clone();
        }
        let primary = tag.split('-').next().unwrap_or(tag);
        if let Some(found) = supported.iter().find(|s| s.eq_ignore_ascii_case(primary)) {
            return found.clone();
        }
    }

    default.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supported() -> Vec<String> {
        vec!["pl".to_string(), "en".to_string()]
    }

    #[test]
    fn test_catalogs_parse() {
        for (locale, json) in EMBEDDED {
            let parsed: Result<Catalog, _> = serde_json::from_str(json);
            assert!(parsed.is_ok(), "catalog {} does not parse", locale);
        }
        assert_eq!(available_locales(), vec!["en", "pl"]);
    }

    #[test]
    fn test_catalogs_have_same_keys() {
        let pl: Vec<&String> = catalog("pl").unwrap().keys().collect();
        let en: Vec<&String> = catalog("en").unwrap().keys().collect();
        assert_eq!(pl, en);
    }

    #[test]
    fn test_unknown_locale() {
        assert_eq!(
            catalog("de").unwrap_err(),
            I18nError::UnknownLocale("de".to_string())
        );
    }

    #[test]
    fn test_translate_fallbacks() {
        assert_eq!(translate("en", "pl", "auth.login"), "Sign in");
        assert_eq!(translate("de", "pl", "auth.login"), "Zaloguj się");
        assert_eq!(translate("en", "pl", "no.such.key"), "no.such.key");
    }

    #[test]
    fn test_negotiate_locale() {
        let s = supported();
        assert_eq!(negotiate_locale(None, &s, "pl"), "pl");
        assert_eq!(negotiate_locale(Some(""), &s, "pl"), "pl");
        assert_eq!(negotiate_locale(Some("en-GB,en;q=0.9"), &s, "pl"), "en");
        assert_eq!(negotiate_locale(Some("de-DE,de;q=0.9,en;q=0.5"), &s, "pl"), "en");
        assert_eq!(negotiate_locale(Some("en;q=0.3,pl;q=0.8"), &s, "pl"), "pl");
        assert_eq!(negotiate_locale(Some("fr,de"), &s, "pl"), "pl");
        assert_eq!(negotiate_locale(Some("en;q=0,pl;q=0.1"), &s, "en"), "pl");
        assert_eq!(negotiate_locale(Some("PL"), &s, "en"), "pl");
    }
}
