//! Ranking - live placings of all racers at an instant
//!
//! Racers are split into two partitions. Finished racers are ordered by
//! finish time; racers still on course are ordered by distance remaining.
//! Every finished racer places ahead of every unfinished one, so the two
//! score scales are never compared with each other.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::replay::interpolation::position_at;
use crate::replay::kinematics::haversine_distance;
use crate::replay::track::{RacerId, TrackPath};

/// One racer's standing at the queried instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacerProgress {
    pub racer_id: RacerId,
    /// Distance covered so far (meters)
    pub distance_meters: f64,
    /// Finish time in epoch milliseconds when finished, otherwise meters
    /// remaining. Lower is better, within a partition only.
    pub ranking_score: f64,
    pub finish_timestamp: Option<DateTime<Utc>>,
    /// 1-based placing
    pub rank: u32,
}

impl RacerProgress {
    pub fn has_finished(&self) -> bool {
        self.finish_timestamp.is_some()
    }
}

/// Progress of a single racer, unranked
pub fn racer_progress(path: &TrackPath, target: DateTime<Utc>) -> Option<RacerProgress> {
    let last = path.last()?;

    if target >= last.timestamp {
        return Some(RacerProgress {
            racer_id: path.racer_id,
            distance_meters: path.total_distance,
            ranking_score: last.timestamp.timestamp_millis() as f64,
            finish_timestamp: Some(last.timestamp),
            rank: 0,
        });
    }

    let (distance_meters, ranking_score) = match distance_traveled(path, target) {
        Some(traveled) => (traveled, path.total_distance - traveled),
        None => (0.0, f64::INFINITY),
    };

    Some(RacerProgress {
        racer_id: path.racer_id,
        distance_meters,
        ranking_score,
        finish_timestamp: None,
        rank: 0,
    })
}

/// Meters covered by `target`, or `None` before the first fix
fn distance_traveled(path: &TrackPath, target: DateTime<Utc>) -> Option<f64> {
    let points = &path.points;
    let k = points.iter().rposition(|p| p.timestamp <= target)?;

    let mut traveled: f64 = points[..=k]
        .windows(2)
        .map(|w| w[0].distance_to(&w[1]))
        .sum();

    if k < points.len() - 1 {
        if let Some(pos) = position_at(path, target, k) {
            traveled += haversine_distance(points[k].lat, points[k].lon, pos.lat, pos.lon);
        }
    }

    Some(traveled)
}

fn compare_placing(a: &RacerProgress, b: &RacerProgress) -> Ordering {
    match (a.has_finished(), b.has_finished()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a.finish_timestamp.cmp(&b.finish_timestamp),
        (false, false) => a.ranking_score.total_cmp(&b.ranking_score),
    }
}

/// Placings for every non-degenerate track, best first, ranks `1..=N`.
///
/// Tracks with zero total distance are left out.
pub fn placings(paths: &[TrackPath], target: DateTime<Utc>) -> Vec<RacerProgress> {
    let mut standings: Vec<RacerProgress> = paths
        .iter()
        .filter(|p| p.total_distance > 0.0)
        .filter_map(|p| racer_progress(p, target))
        .collect();

    standings.sort_by(compare_placing);

    for (i, progress) in standings.iter_mut().enumerate() {
        progress.rank = (i + 1) as u32;
    }
    standings
}
