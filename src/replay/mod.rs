//! Replay Module
//!
//! Race replay engine: interpolates every racer's GPS track at the current
//! simulation time, ranks racers live and drives the simulation clock from
//! host frame callbacks.

pub mod error;
pub mod interpolation;
pub mod kinematics;
pub mod ranking;
pub mod scheduler;
pub mod session;
pub mod track;
pub mod track_loader;

pub use error::ReplayError;
pub use interpolation::{position_at, InterpolatedPosition, SearchHints};
pub use kinematics::{speed_and_heading, CardinalDirection, SpeedHeading};
pub use ranking::{placings, RacerProgress};
pub use scheduler::{
    AnimationScheduler, FrameHost, FrameRequest, PlaybackState, PolledFrames, TickOutcome,
};
pub use session::{RacerStats, ReplayConfig, ReplaySession, ReplaySnapshot, Timeline};
pub use track::{RacerId, TimeBounds, TrackPath, TrackPoint};
pub use track_loader::{EventType, RacerEntry};
