//! Nearest-city lookup over the fixed city table.

use serde::Serialize;
use thiserror::Error;

use crate::db::{City, CITIES};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Latitude must be between -90 and 90")]
    InvalidLatitude,
    #[error("Longitude must be between -180 and 180")]
    InvalidLongitude,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestCity {
    pub city: &'static str,
    pub name: &'static str,
    pub distance_km: f64,
}

/// Great-circle distance between two points in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), GeoError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(GeoError::InvalidLatitude);
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(GeoError::InvalidLongitude);
    }
    Ok(())
}

/// Closest supported city to the given coordinates
pub fn nearest_city(lat: f64, lon: f64) -> Result<NearestCity, GeoError> {
    validate_coordinates(lat, lon)?;

    let (city, distance) = CITIES
        .iter()
        .map(|c: &City| (c, haversine_km(lat, lon, c.lat, c.lon)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, d)| (*c, d))
        .unwrap_or((CITIES[0], 0.0));

    Ok(NearestCity {
        city: city.slug,
        name: city.name,
        distance_km: (distance * 10.0).round() / 10.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Warszawa -> Kraków is roughly 252 km
        let d = haversine_km(52.2297, 21.0122, 50.0647, 19.9450);
        assert!((d - 252.0).abs() < 5.0, "got {}", d);
        assert!(haversine_km(50.0, 19.0, 50.0, 19.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nearest_city() {
        // Sopot resolves to Gdańsk
        let nearest = nearest_city(54.4416, 18.5601).unwrap();
        assert_eq!(nearest.city, "gdansk");
        assert!(nearest.distance_km < 15.0);

        // Wieliczka resolves to Kraków
        assert_eq!(nearest_city(49.9871, 20.0647).unwrap().city, "krakow");
    }

    #[test]
    fn test_invalid_coordinates() {
        assert_eq!(nearest_city(91.0, 0.0).unwrap_err(), GeoError::InvalidLatitude);
        assert_eq!(nearest_city(0.0, -181.0).unwrap_err(), GeoError::InvalidLongitude);
        assert_eq!(nearest_city(f64::NAN, 0.0).unwrap_err(), GeoError::InvalidLatitude);
    }
}
