//! Geographic primitives: coordinates, haversine distance, and proximity tests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NavError;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance within which a path point counts as passing a bottleneck.
pub const DEFAULT_PROXIMITY_THRESHOLD_M: f64 = 100.0;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Build a coordinate without range checks. Use [`Coordinate::validate`]
    /// or [`Coordinate::checked`] on untrusted input.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn checked(lat: f64, lon: f64) -> Result<Self, NavError> {
        let coordinate = Self::new(lat, lon);
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Parse the `"lat,lon"` form used in URLs and saved routes.
    pub fn parse(raw: &str) -> Result<Self, NavError> {
        let invalid = |reason: &str| NavError::InvalidCoordinate {
            lat: f64::NAN,
            lon: f64::NAN,
            reason: format!("{reason}: {raw:?}"),
        };
        let (lat, lon) = raw
            .split_once(',')
            .ok_or_else(|| invalid("expected \"lat,lon\""))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("latitude is not a number"))?;
        let lon = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("longitude is not a number"))?;
        Self::checked(lat, lon)
    }

    pub fn validate(&self) -> Result<(), NavError> {
        let reason = if !self.lat.is_finite() || !self.lon.is_finite() {
            Some("components must be finite")
        } else if !(-90.0..=90.0).contains(&self.lat) {
            Some("latitude must be within [-90, 90]")
        } else if !(-180.0..=180.0).contains(&self.lon) {
            Some("longitude must be within [-180, 180]")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(NavError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Arithmetic midpoint. Accurate enough at city scale.
    pub fn midpoint(&self, other: &Coordinate) -> Coordinate {
        Coordinate::new((self.lat + other.lat) * 0.5, (self.lon + other.lon) * 0.5)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl FromStr for Coordinate {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coordinate::parse(s)
    }
}

/// Great-circle distance in metres.
pub fn haversine_distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let sin_dlat = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon = ((lon2 - lon1) * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

pub fn is_near_any(point: Coordinate, bottlenecks: &[Coordinate], threshold_m: f64) -> bool {
    bottlenecks
        .iter()
        .any(|bottleneck| haversine_distance_m(point, *bottleneck) <= threshold_m)
}

/// First candidate within `threshold_m` of `point`, in slice order.
pub fn nearest_within<'a, T>(
    point: Coordinate,
    candidates: &'a [T],
    threshold_m: f64,
    position: impl Fn(&T) -> Coordinate,
) -> Option<&'a T> {
    candidates
        .iter()
        .find(|candidate| haversine_distance_m(point, position(candidate)) <= threshold_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let a = Coordinate::new(6.4541, 3.3947);
        assert_eq!(haversine_distance_m(a, a), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(6.4541, 3.3947);
        let b = Coordinate::new(6.4678, 3.4498);
        assert_eq!(haversine_distance_m(a, b), haversine_distance_m(b, a));
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_distance_m(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn near_any_respects_threshold() {
        let bottleneck = Coordinate::new(6.45, 3.40);
        let fifty_m_north = Coordinate::new(6.45 + (50.0 / EARTH_RADIUS_M).to_degrees(), 3.40);
        assert!(is_near_any(fifty_m_north, &[bottleneck], 100.0));
        assert!(!is_near_any(fifty_m_north, &[bottleneck], 40.0));
        assert!(!is_near_any(fifty_m_north, &[], 100.0));
    }

    #[test]
    fn parse_accepts_lat_lon_string() {
        let c = Coordinate::parse(" 6.4541, 3.3947 ").expect("valid");
        assert_eq!(c, Coordinate::new(6.4541, 3.3947));
        assert_eq!(c.to_string(), "6.4541,3.3947");
    }

    #[test]
    fn parse_rejects_garbage_and_out_of_range() {
        assert!(matches!(
            Coordinate::parse("6.45"),
            Err(NavError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::parse("abc,3.39"),
            Err(NavError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::parse("91,3.39"),
            Err(NavError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::parse("6.45,181"),
            Err(NavError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 3.0).validate().is_err());
        assert!(Coordinate::new(6.0, f64::INFINITY).validate().is_err());
        assert!(Coordinate::new(-90.0, 180.0).validate().is_ok());
    }
}
