//! Interpolation - where a racer is at an arbitrary instant
//!
//! Positions are interpolated along the great circle between the two fixes
//! bracketing the target time. Lookups take a segment hint so that forward
//! playback only ever walks a few segments per frame; a query that moved
//! backwards falls back to a scan from the start of the track.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replay::kinematics::{self, seconds_between};
use crate::replay::track::{RacerId, TrackPath, TrackPoint};

/// Below this angular separation (radians) two fixes are treated as one
const MIN_SLERP_ANGLE: f64 = 1e-6;

/// Interpolated position plus the segment it was found in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolatedPosition {
    pub lat: f64,
    pub lon: f64,
    /// Index `i` of the segment `[i, i + 1]`; feed back as the next hint
    pub segment_index: usize,
}

impl InterpolatedPosition {
    fn at_point(point: &TrackPoint, segment_index: usize) -> Self {
        Self {
            lat: point.lat,
            lon: point.lon,
            segment_index,
        }
    }
}

/// Position of `path` at `target`, or `None` for an empty track.
///
/// Times before the first fix clamp to it (segment 0), times after the last
/// fix clamp to it (segment `len - 2`).
pub fn position_at(
    path: &TrackPath,
    target: DateTime<Utc>,
    search_hint: usize,
) -> Option<InterpolatedPosition> {
    let points = &path.points;
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return None,
    };

    if points.len() == 1 || target <= first.timestamp {
        return Some(InterpolatedPosition::at_point(first, 0));
    }
    if target >= last.timestamp {
        return Some(InterpolatedPosition::at_point(last, points.len() - 2));
    }

    let index = find_segment(points, target, search_hint);
    let (p1, p2) = (&points[index], &points[index + 1]);

    let span = seconds_between(p1.timestamp, p2.timestamp);
    if span == 0.0 {
        return Some(InterpolatedPosition::at_point(p1, index));
    }

    let factor = seconds_between(p1.timestamp, target) / span;
    let (lat, lon) = slerp(p1.lat, p1.lon, p2.lat, p2.lon, factor);
    Some(InterpolatedPosition {
        lat,
        lon,
        segment_index: index,
    })
}

fn brackets(points: &[TrackPoint], i: usize, target: DateTime<Utc>) -> bool {
    points[i].timestamp <= target && target <= points[i + 1].timestamp
}

/// Index of the segment containing `target`; requires at least two points
fn find_segment(points: &[TrackPoint], target: DateTime<Utc>, hint: usize) -> usize {
    let last_segment = points.len() - 2;
    let hint = hint.min(last_segment);

    if let Some(i) = (hint..=last_segment).find(|&i| brackets(points, i, target)) {
        return i;
    }

    // Target moved backwards past the hint
    log::trace!("segment hint {} overshot, rescanning from start", hint);
    (0..hint)
        .find(|&i| brackets(points, i, target))
        .unwrap_or(last_segment)
}

/// Spherical linear interpolation between two lat/lon pairs (degrees)
pub fn slerp(lat1: f64, lon1: f64, lat2: f64, lon2: f64, factor: f64) -> (f64, f64) {
    let omega = kinematics::central_angle(lat1, lon1, lat2, lon2);
    if omega < MIN_SLERP_ANGLE {
        return (lat1, lon1);
    }

    let sin_omega = omega.sin();
    let a = ((1.0 - factor) * omega).sin() / sin_omega;
    let b = (factor * omega).sin() / sin_omega;

    let v1 = to_unit_vector(lat1, lon1);
    let v2 = to_unit_vector(lat2, lon2);
    let x = a * v1[0] + b * v2[0];
    let y = a * v1[1] + b * v2[1];
    let z = a * v1[2] + b * v2[2];

    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    let lon = y.atan2(x).to_degrees();
    (lat, lon)
}

fn to_unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Last segment found per racer, reused as the next lookup's starting point.
///
/// Indices are only meaningful for the tracks they were found in; clear the
/// cache whenever tracks are reloaded.
#[derive(Debug, Clone, Default)]
pub struct SearchHints {
    segments: HashMap<RacerId, usize>,
}

impl SearchHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, racer_id: RacerId) -> usize {
        self.segments.get(&racer_id).copied().unwrap_or(0)
    }

    pub fn record(&mut self, racer_id: RacerId, segment_index: usize) {
        self.segments.insert(racer_id, segment_index);
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Interpolate using and then updating this racer's hint
    pub fn position_at(
        &mut self,
        path: &TrackPath,
        target: DateTime<Utc>,
    ) -> Option<InterpolatedPosition> {
        let found = position_at(path, target, self.get(path.racer_id))?;
        self.record(path.racer_id, found.segment_index);
        Some(found)
    }
}
