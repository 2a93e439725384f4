//! Public reference data: cities, tags, nearest city and message catalogs.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{find_city, City, CITIES, TAGS};
use crate::geo::{self, GeoError, NearestCity};
use crate::i18n::{self, Catalog, I18nError};
use crate::AppState;

use super::error::ApiError;

impl From<GeoError> for ApiError {
    fn from(err: GeoError) -> Self {
        let field = match err {
            GeoError::InvalidLatitude => "lat",
            GeoError::InvalidLongitude => "lon",
        };
        ApiError::validation_field(field, err.to_string())
    }
}

impl From<I18nError> for ApiError {
    fn from(err: I18nError) -> Self {
        ApiError::not_found(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// GET /api/geo/nearest?lat=&lon=
///
/// Without coordinates (location denied) the configured default city is returned.
pub async fn nearest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<NearestCity>, ApiError> {
    match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => Ok(Json(geo::nearest_city(lat, lon)?)),
        (None, None) => {
            let slug = &state.config.geo.default_city;
            let city = find_city(slug).ok_or_else(|| {
                tracing::error!(city = %slug, "Configured default city is not supported");
                ApiError::internal("Default city is misconfigured")
            })?;
            Ok(Json(NearestCity {
                city: city.slug,
                name: city.name,
                distance_km: 0.0,
            }))
        }
        (None, Some(_)) => Err(ApiError::validation_field("lat", "lat and lon go together")),
        (Some(_), None) => Err(ApiError::validation_field("lon", "lat and lon go together")),
    }
}

/// GET /api/geo/cities
pub async fn list_cities() -> Json<&'static [City]> {
    Json(&CITIES)
}

/// GET /api/meta/tags
pub async fn list_tags() -> Json<&'static [&'static str]> {
    Json(&TAGS)
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub locale: String,
    pub available: Vec<&'static str>,
    pub messages: &'static Catalog,
}

/// GET /api/i18n
///
/// Catalog for the locale negotiated from `Accept-Language`.
pub async fn negotiated_catalog(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CatalogResponse>, ApiError> {
    let accept = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok());
    let locale = i18n::negotiate_locale(
        accept,
        &state.config.i18n.locales,
        &state.config.i18n.default_locale,
    );
    let messages = i18n::catalog(&locale)?;
    Ok(Json(CatalogResponse {
        locale,
        available: i18n::available_locales(),
        messages,
    }))
}

/// GET /api/i18n/:locale
pub async fn locale_catalog(Path(locale): Path<String>) -> Result<Json<CatalogResponse>, ApiError> {
    let locale = locale.to_lowercase();
    let messages = i18n::catalog(&locale)?;
    Ok(Json(CatalogResponse {
        locale,
        available: i18n::available_locales(),
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_geo_error_maps_to_validation() {
        let err: ApiError = GeoError::InvalidLatitude.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_locale_is_not_found() {
        let err = locale_catalog(Path("de".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let ok = locale_catalog(Path("EN".to_string())).await.unwrap();
        assert_eq!(ok.0.locale, "en");
    }
}
