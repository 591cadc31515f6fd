//! Track - GPS track data handed to the replay engine
//!
//! Tracks are built once per loaded event and are read-only afterwards.
//! Points are assumed to be in ascending timestamp order; this is checked
//! (and logged) but never enforced.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replay::kinematics;

/// Identifier of a racer within an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RacerId(pub i64);

impl fmt::Display for RacerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single recorded GPS fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64, timestamp: DateTime<Utc>) -> Self {
        Self { lat, lon, timestamp }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &TrackPoint) -> f64 {
        kinematics::distance_meters(self, other)
    }
}

/// The complete track of one racer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPath {
    pub racer_id: RacerId,
    pub points: Vec<TrackPoint>,
    /// Display color, opaque to the engine
    pub track_color: String,
    /// Sum of haversine distances between consecutive points (meters)
    pub total_distance: f64,
}

impl TrackPath {
    /// Build a track and precompute its total distance
    pub fn new(racer_id: RacerId, points: Vec<TrackPoint>, track_color: impl Into<String>) -> Self {
        let total_distance = Self::sum_distance(&points);
        Self {
            racer_id,
            points,
            track_color: track_color.into(),
            total_distance,
        }
    }

    fn sum_distance(points: &[TrackPoint]) -> f64 {
        points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
    }

    pub fn first(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    /// Whether timestamps never decrease along the track
    pub fn is_chronological(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

/// Start and end of the replay timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeBounds {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Earliest first point and latest last point across all tracks.
    ///
    /// Falls back to the event's declared dates when no track has points,
    /// and to `fallback_now` for whichever declared date is missing.
    pub fn from_tracks(
        paths: &[TrackPath],
        event_start: Option<DateTime<Utc>>,
        event_end: Option<DateTime<Utc>>,
        fallback_now: DateTime<Utc>,
    ) -> Self {
        let start = paths.iter().filter_map(|p| p.first()).map(|p| p.timestamp).min();
        let end = paths.iter().filter_map(|p| p.last()).map(|p| p.timestamp).max();

        match (start, end) {
            (Some(start), Some(end)) => Self { start, end },
            _ => Self {
                start: event_start.unwrap_or(fallback_now),
                end: event_end.unwrap_or(fallback_now),
            },
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn clamp(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        time.max(self.start).min(self.end)
    }
}
