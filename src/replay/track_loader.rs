//! Track loader - GPX files to replay tracks
//!
//! Flattens every track and segment of a GPX document into one ordered list
//! of timed fixes. Time-trial events re-anchor each file to the Unix epoch so
//! efforts recorded on different days race against each other.

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::replay::error::{ReplayError, Result};
use crate::replay::track::{RacerId, TrackPath, TrackPoint};

/// Kind of event, which decides how timestamps are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Mass start; absolute timestamps are kept
    #[default]
    Race,
    /// Individual efforts; every track starts at the same instant
    TimeTrial,
}

/// One racer's uploaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacerEntry {
    pub racer_id: RacerId,
    pub gpx_path: PathBuf,
    pub track_color: Option<String>,
}

/// Parse GPX bytes into a track.
///
/// Fixes without a timestamp are skipped. Returns `Ok(None)` when nothing
/// usable remains.
pub fn parse_gpx(
    input: &[u8],
    racer_id: RacerId,
    event_type: EventType,
) -> Result<Option<TrackPath>> {
    let mut cursor = Cursor::new(input);
    let gpx = gpx::read(&mut cursor).map_err(|e| ReplayError::GpxParse(e.to_string()))?;

    let mut points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let Some(time) = point.time else {
                    continue;
                };
                let iso = time
                    .format()
                    .map_err(|e| ReplayError::GpxParse(e.to_string()))?;
                let timestamp = DateTime::parse_from_rfc3339(&iso)
                    .map_err(|e| ReplayError::GpxParse(e.to_string()))?
                    .with_timezone(&Utc);
                let geo = point.point();
                points.push(TrackPoint::new(geo.y(), geo.x(), timestamp));
            }
        }
    }

    if points.is_empty() {
        return Ok(None);
    }

    if event_type == EventType::TimeTrial {
        anchor_to_epoch(&mut points);
    }

    let path = TrackPath::new(racer_id, points, String::new());
    if !path.is_chronological() {
        log::warn!("Track for racer {} has out-of-order timestamps", racer_id);
    }
    Ok(Some(path))
}

/// Read and parse a GPX file from disk
pub fn load_gpx_file(
    path: impl AsRef<Path>,
    racer_id: RacerId,
    event_type: EventType,
) -> Result<Option<TrackPath>> {
    let bytes = fs::read(path.as_ref())?;
    parse_gpx(&bytes, racer_id, event_type)
}

/// Shift timestamps so the first fix sits at the Unix epoch, keeping the
/// elapsed time of every later fix.
pub fn anchor_to_epoch(points: &mut [TrackPoint]) {
    let Some(start) = points.first().map(|p| p.timestamp) else {
        return;
    };
    for point in points.iter_mut() {
        point.timestamp = DateTime::<Utc>::UNIX_EPOCH + (point.timestamp - start);
    }
}

/// Random `#rrggbb` color not already used in the event
pub fn unique_track_color<R: Rng>(existing: &HashSet<String>, rng: &mut R) -> String {
    loop {
        let color = format!("#{:06x}", rng.gen_range(0..0xFF_FFFF));
        if !existing.contains(&color) {
            return color;
        }
    }
}

/// Load every racer's file for an event.
///
/// Unreadable or unparsable files are logged and skipped, as are files
/// with no timed fixes. Racers without a color get a fresh unique one.
pub fn load_event_tracks<R: Rng>(
    entries: &[RacerEntry],
    event_type: EventType,
    rng: &mut R,
) -> Vec<TrackPath> {
    let mut used_colors: HashSet<String> = entries
        .iter()
        .filter_map(|e| e.track_color.clone())
        .collect();

    let mut paths = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut path = match load_gpx_file(&entry.gpx_path, entry.racer_id, event_type) {
            Ok(Some(path)) => path,
            Ok(None) => {
                log::info!("Skipping {}: no timed track points", entry.gpx_path.display());
                continue;
            }
            Err(e) => {
                log::warn!(
                    "Could not process GPX file {} for racer {}: {}",
                    entry.gpx_path.display(),
                    entry.racer_id,
                    e
                );
                continue;
            }
        };

        path.track_color = match &entry.track_color {
            Some(color) => color.clone(),
            None => {
                let color = unique_track_color(&used_colors, rng);
                used_colors.insert(color.clone());
                color
            }
        };
        paths.push(path);
    }

    log::info!("Loaded {} of {} racer tracks", paths.len(), entries.len());
    paths
}
