use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::replay::track::RacerId;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to parse GPX file: {0}")]
    GpxParse(String),
    #[error("failed to read track file: {0}")]
    Io(#[from] std::io::Error),
    #[error("speed multiplier must be positive and finite, got {0}")]
    InvalidSpeed(f64),
    #[error("event ends ({end}) before it starts ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("no racer with id {0} in the loaded event")]
    UnknownRacer(RacerId),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
