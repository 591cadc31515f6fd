//! Session - one loaded event being replayed
//!
//! Owns the tracks, the per-racer segment hints and the simulation clock,
//! and answers everything the map and leaderboard need for the current
//! instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::replay::error::{ReplayError, Result};
use crate::replay::interpolation::SearchHints;
use crate::replay::kinematics::{speed_and_heading, CardinalDirection, SpeedHeading};
use crate::replay::ranking::{placings, RacerProgress};
use crate::replay::scheduler::{
    AnimationScheduler, FrameHost, FrameRequest, PlaybackState, TickOutcome,
};
use crate::replay::track::{RacerId, TimeBounds, TrackPath};
use crate::replay::track_loader::EventType;

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayConfig {
    /// Simulation seconds per wall-clock second
    pub speed_multiplier: f64,
    /// How uploaded tracks are aligned in time
    pub event_type: EventType,
    /// Declared event dates, used only when no track has points
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 60.0,
            event_type: EventType::Race,
            event_start: None,
            event_end: None,
        }
    }
}

/// Marker position of one racer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacerPosition {
    pub racer_id: RacerId,
    pub lat: f64,
    pub lon: f64,
}

/// Compact replay state for the render loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySnapshot {
    pub simulation_time: DateTime<Utc>,
    pub state: PlaybackState,
    pub progress_percent: f64,
    pub positions: Vec<RacerPosition>,
    /// Whether the clock wants another frame
    pub frame_requested: bool,
}

/// Live readout for the selected racer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacerStats {
    pub racer_id: RacerId,
    pub speed_kph: f64,
    pub heading_degrees: f64,
    pub cardinal_direction: CardinalDirection,
    /// `None` when the racer is not ranked (zero-distance track)
    pub rank: Option<u32>,
    pub total_racer_count: usize,
}

/// Timeline control state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub simulation_time: DateTime<Utc>,
    pub progress_percent: f64,
    pub elapsed: String,
    pub total: String,
    pub is_playing: bool,
    pub speed_multiplier: f64,
}

/// A replay of one event
pub struct ReplaySession<H: FrameHost> {
    config: ReplayConfig,
    paths: Vec<TrackPath>,
    hints: SearchHints,
    scheduler: AnimationScheduler<H>,
}

impl<H: FrameHost> ReplaySession<H> {
    /// Empty session; call [`ReplaySession::load`] to replay an event
    pub fn new(host: H, config: ReplayConfig) -> Result<Self> {
        let bounds = Self::bounds_for(&[], &config)?;
        let scheduler = AnimationScheduler::new(host, bounds, config.speed_multiplier)?;
        Ok(Self {
            config,
            paths: Vec::new(),
            hints: SearchHints::new(),
            scheduler,
        })
    }

    fn bounds_for(paths: &[TrackPath], config: &ReplayConfig) -> Result<TimeBounds> {
        let bounds =
            TimeBounds::from_tracks(paths, config.event_start, config.event_end, Utc::now());
        if !bounds.is_valid() {
            return Err(ReplayError::InvalidTimeRange {
                start: bounds.start,
                end: bounds.end,
            });
        }
        Ok(bounds)
    }

    /// Replace the event's tracks; pauses at the new start
    pub fn load(&mut self, paths: Vec<TrackPath>) -> Result<()> {
        let bounds = Self::bounds_for(&paths, &self.config)?;

        for path in paths.iter().filter(|p| !p.is_chronological()) {
            log::warn!(
                "Racer {} has out-of-order timestamps; replay is best-effort",
                path.racer_id
            );
        }

        self.paths = paths;
        self.hints.clear();
        self.scheduler.reset(bounds);
        log::info!(
            "Loaded {} tracks, timeline {} to {}",
            self.paths.len(),
            bounds.start,
            bounds.end
        );
        Ok(())
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn paths(&self) -> &[TrackPath] {
        &self.paths
    }

    pub fn scheduler(&self) -> &AnimationScheduler<H> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut AnimationScheduler<H> {
        &mut self.scheduler
    }

    pub fn simulation_time(&self) -> DateTime<Utc> {
        self.scheduler.simulation_time()
    }

    pub fn play(&mut self) {
        self.scheduler.play();
    }

    pub fn pause(&mut self) {
        self.scheduler.pause();
        log::debug!("Replay paused at {}", self.simulation_time());
    }

    pub fn scrub(&mut self, progress_percent: f64) {
        self.scheduler.scrub(progress_percent);
        log::debug!("Scrubbed to {:.1}% ({})", progress_percent, self.simulation_time());
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        self.scheduler.set_speed(multiplier)?;
        self.config.speed_multiplier = multiplier;
        log::info!("Replay speed set to {}x", multiplier);
        Ok(())
    }

    /// Advance the clock to `now` and return the refreshed state
    pub fn tick(&mut self, now: Instant) -> (TickOutcome, ReplaySnapshot) {
        let outcome = self.scheduler.tick(now);
        (outcome, self.snapshot())
    }

    /// Deliver a specific frame request from the host
    pub fn on_frame(
        &mut self,
        request: FrameRequest,
        now: Instant,
    ) -> (TickOutcome, ReplaySnapshot) {
        let outcome = self.scheduler.on_frame(request, now);
        (outcome, self.snapshot())
    }

    /// Marker position of every racer with at least one fix
    pub fn positions(&mut self) -> Vec<RacerPosition> {
        let target = self.scheduler.simulation_time();
        let hints = &mut self.hints;
        self.paths
            .iter()
            .filter_map(|path| {
                hints.position_at(path, target).map(|pos| RacerPosition {
                    racer_id: path.racer_id,
                    lat: pos.lat,
                    lon: pos.lon,
                })
            })
            .collect()
    }

    pub fn snapshot(&mut self) -> ReplaySnapshot {
        ReplaySnapshot {
            simulation_time: self.scheduler.simulation_time(),
            state: self.scheduler.state(),
            progress_percent: self.scheduler.progress_percent(),
            positions: self.positions(),
            frame_requested: self.scheduler.pending_frame().is_some(),
        }
    }

    /// Placings at the current simulation time, best first
    pub fn leaderboard(&self) -> Vec<RacerProgress> {
        placings(&self.paths, self.scheduler.simulation_time())
    }

    /// Speed, heading and placing of one racer right now
    pub fn racer_stats(&mut self, racer_id: RacerId) -> Result<RacerStats> {
        let target = self.scheduler.simulation_time();
        let path = self
            .paths
            .iter()
            .find(|p| p.racer_id == racer_id)
            .ok_or(ReplayError::UnknownRacer(racer_id))?;

        let motion = match self.hints.position_at(path, target) {
            Some(pos) if path.points.len() >= 2 => speed_and_heading(
                &path.points[pos.segment_index],
                &path.points[pos.segment_index + 1],
            ),
            _ => SpeedHeading::default(),
        };

        let standings = placings(&self.paths, target);
        let rank = standings
            .iter()
            .find(|p| p.racer_id == racer_id)
            .map(|p| p.rank);

        Ok(RacerStats {
            racer_id,
            speed_kph: motion.speed_kph,
            heading_degrees: motion.heading_degrees,
            cardinal_direction: CardinalDirection::from_heading(motion.heading_degrees),
            rank,
            total_racer_count: standings.len(),
        })
    }

    pub fn timeline(&self) -> Timeline {
        let bounds = self.scheduler.bounds();
        let now = self.scheduler.simulation_time();
        Timeline {
            start: bounds.start,
            end: bounds.end,
            simulation_time: now,
            progress_percent: self.scheduler.progress_percent(),
            elapsed: format_duration(now - bounds.start),
            total: format_duration(bounds.duration()),
            is_playing: self.scheduler.is_playing(),
            speed_multiplier: self.scheduler.speed_multiplier(),
        }
    }
}

/// `HH:MM:SS`, hours unbounded, negative durations shown as zero
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
