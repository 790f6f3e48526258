//! Coordinates and great-circle distance.

use std::fmt;

use edge_core::{AppError, DataError};
use serde::Serialize;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const KM_TO_MILES: f64 = 0.621371;

/// Decimal places used when rendering a coordinate.
const DISPLAY_PRECISION: usize = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("Latitude must be finite and within [-90, 90], got {0}")]
    Latitude(f64),
    #[error("Longitude must be finite and within [-180, 180], got {0}")]
    Longitude(f64),
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::Data(DataError::InvalidCoordinate(e.to_string()))
    }
}

/// Validated (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.prec$}, {:.prec$}",
            self.lat,
            self.lon,
            prec = DISPLAY_PRECISION
        )
    }
}

/// Haversine great-circle distance in kilometres.
///
/// Identical points yield exactly `0.0` and the result is symmetric in its
/// arguments.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + a.lat.to_radians().cos()
            * b.lat.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    distance_km(a, b) * KM_TO_MILES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_identical_points_are_zero_apart() {
        let nyc = point(40.7128, -74.006);
        assert_eq!(distance_km(nyc, nyc), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let rio = point(-22.9068, -43.1729);
        let buenos_aires = point(-34.6037, -58.3816);
        assert_eq!(distance_km(rio, buenos_aires), distance_km(buenos_aires, rio));
    }

    #[test]
    fn test_paris_to_lyon() {
        let paris = point(48.8566, 2.3522);
        let lyon = point(45.764, 4.8357);
        assert!((distance_km(paris, lyon) - 392.2).abs() < 1.5);
    }

    #[test]
    fn test_across_equator_and_prime_meridian() {
        let north_south = distance_km(point(10.0, 0.0), point(-10.0, 0.0));
        let east_west = distance_km(point(0.0, 10.0), point(0.0, -10.0));
        assert!((north_south - 2226.4).abs() < 2.6);
        assert!((east_west - 2226.4).abs() < 2.6);
    }

    #[test]
    fn test_negative_coordinates() {
        let dist = distance_km(point(-22.9068, -43.1729), point(-34.6037, -58.3816));
        assert!((dist - 1968.0).abs() < 5.0);
    }

    #[test]
    fn test_display_uses_three_decimals() {
        assert_eq!(point(34.0522345, -118.2436849).to_string(), "34.052, -118.244");
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::Latitude(91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.5),
            Err(CoordinateError::Longitude(-180.5))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }
}
