//! Kinematics - great-circle distance, bearing and speed between fixes
//!
//! Spherical Earth only; no ellipsoid corrections.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replay::track::TrackPoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two lat/lon pairs in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    EARTH_RADIUS_M * central_angle(lat1, lon1, lat2, lon2)
}

/// Angular separation in radians between two lat/lon pairs
pub fn central_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Signed seconds from `from` to `to`, at microsecond resolution
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

pub fn distance_meters(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    haversine_distance(p1.lat, p1.lon, p2.lat, p2.lon)
}

/// Initial great-circle bearing from point 1 to point 2, in `[0, 360)`
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Instantaneous speed and heading over one segment
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedHeading {
    pub speed_kph: f64,
    pub heading_degrees: f64,
}

/// Speed (km/h) and heading between two fixes.
///
/// Duplicate or out-of-order timestamps yield `{0, 0}`.
pub fn speed_and_heading(p1: &TrackPoint, p2: &TrackPoint) -> SpeedHeading {
    let dt_seconds = seconds_between(p1.timestamp, p2.timestamp);
    if dt_seconds <= 0.0 {
        return SpeedHeading::default();
    }

    SpeedHeading {
        speed_kph: distance_meters(p1, p2) / dt_seconds * 3.6,
        heading_degrees: initial_bearing(p1.lat, p1.lon, p2.lat, p2.lon),
    }
}

/// Eight-point compass rose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardinalDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CardinalDirection {
    const ROSE: [CardinalDirection; 8] = [
        CardinalDirection::N,
        CardinalDirection::NE,
        CardinalDirection::E,
        CardinalDirection::SE,
        CardinalDirection::S,
        CardinalDirection::SW,
        CardinalDirection::W,
        CardinalDirection::NW,
    ];

    /// Nearest compass point for a heading in degrees
    pub fn from_heading(heading: f64) -> Self {
        let index = (heading / 45.0).round() as i64;
        Self::ROSE[index.rem_euclid(8) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardinalDirection::N => "N",
            CardinalDirection::NE => "NE",
            CardinalDirection::E => "E",
            CardinalDirection::SE => "SE",
            CardinalDirection::S => "S",
            CardinalDirection::SW => "SW",
            CardinalDirection::W => "W",
            CardinalDirection::NW => "NW",
        }
    }
}

impl fmt::Display for CardinalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_haversine_distance() {
        let dist = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((dist - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let a = TrackPoint::new(51.5, -0.12, at(0));
        let b = TrackPoint::new(48.85, 2.35, at(0));
        assert!((distance_meters(&a, &b) - distance_meters(&b, &a)).abs() < 1e-6);
        assert_eq!(distance_meters(&a, &a), 0.0);
    }

    #[test]
    fn test_initial_bearing_cardinal_axes() {
        assert!((initial_bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((initial_bearing(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_and_heading() {
        let p1 = TrackPoint::new(0.0, 0.0, at(0));
        let p2 = TrackPoint::new(0.0, 0.001, at(10));
        let result = speed_and_heading(&p1, &p2);
        // ~111.2 m in 10 s
        assert!((result.speed_kph - 40.03).abs() < 0.1);
        assert!((result.heading_degrees - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_speed_and_heading_same_timestamp() {
        let p1 = TrackPoint::new(0.0, 0.0, at(0));
        let p2 = TrackPoint::new(0.0, 0.001, at(0));
        let result = speed_and_heading(&p1, &p2);
        assert_eq!(result, SpeedHeading { speed_kph: 0.0, heading_degrees: 0.0 });
    }

    #[test]
    fn test_speed_and_heading_backwards_time() {
        let p1 = TrackPoint::new(0.0, 0.0, at(10));
        let p2 = TrackPoint::new(0.0, 0.001, at(0));
        assert_eq!(speed_and_heading(&p1, &p2), SpeedHeading::default());
    }

    #[test]
    fn test_cardinal_direction() {
        assert_eq!(CardinalDirection::from_heading(0.0), CardinalDirection::N);
        assert_eq!(CardinalDirection::from_heading(22.4), CardinalDirection::N);
        assert_eq!(CardinalDirection::from_heading(22.6), CardinalDirection::NE);
        assert_eq!(CardinalDirection::from_heading(90.0), CardinalDirection::E);
        assert_eq!(CardinalDirection::from_heading(200.0), CardinalDirection::S);
        assert_eq!(CardinalDirection::from_heading(315.0), CardinalDirection::NW);
        assert_eq!(CardinalDirection::from_heading(350.0), CardinalDirection::N);
        assert_eq!(CardinalDirection::W.to_string(), "W");
    }
}
