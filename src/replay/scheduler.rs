//! Scheduler - the replay's simulation clock
//!
//! Converts wall-clock frame callbacks into simulation-time advances scaled
//! by a speed multiplier. Frames come from an injected [`FrameHost`], so the
//! clock works the same under a webview paint loop, a fixed timer or a test.
//! At most one frame request is outstanding at any time.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::replay::error::{ReplayError, Result};
use crate::replay::track::TimeBounds;

/// Handle for one requested frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRequest(pub u64);

/// Whatever runtime delivers "next frame" notifications
pub trait FrameHost {
    /// Ask to be notified once, at the next rendering opportunity
    fn request_frame(&mut self) -> FrameRequest;
    /// Withdraw a request that has not fired yet
    fn cancel_frame(&mut self, request: FrameRequest);
    /// The request has fired and been handled; it is no longer outstanding
    fn frame_delivered(&mut self, _request: FrameRequest) {}
}

/// Frame host for callers that drive frames themselves.
///
/// It only records the outstanding request; the caller checks
/// [`PolledFrames::pending`] and delivers the frame by calling
/// [`AnimationScheduler::on_frame`]. The request is cleared once delivered,
/// so `pending` is `None` after the clock auto-stops.
#[derive(Debug, Default)]
pub struct PolledFrames {
    next_id: u64,
    pending: Option<FrameRequest>,
    requested: u64,
    cancelled: u64,
}

impl PolledFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Total requests made so far
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Total requests withdrawn so far
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameHost for PolledFrames {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        self.requested += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        }
    }

    fn frame_delivered(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// What a delivered frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// Time advanced and the next frame was requested
    Advanced,
    /// The clock reached the end of the race and paused itself
    Finished,
    /// Paused, or a stale frame; nothing changed
    Ignored,
}

/// Simulation clock driven by host frames
pub struct AnimationScheduler<H: FrameHost> {
    host: H,
    bounds: TimeBounds,
    simulation_time: DateTime<Utc>,
    state: PlaybackState,
    speed_multiplier: f64,
    last_wall_clock: Option<Instant>,
    pending_frame: Option<FrameRequest>,
}

impl<H: FrameHost> AnimationScheduler<H> {
    /// New clock, paused at the start of `bounds`
    pub fn new(host: H, bounds: TimeBounds, speed_multiplier: f64) -> Result<Self> {
        validate_speed(speed_multiplier)?;
        Ok(Self {
            host,
            bounds,
            simulation_time: bounds.start,
            state: PlaybackState::Paused,
            speed_multiplier,
            last_wall_clock: None,
            pending_frame: None,
        })
    }

    pub fn simulation_time(&self) -> DateTime<Utc> {
        self.simulation_time
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn bounds(&self) -> TimeBounds {
        self.bounds
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.pending_frame
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Start advancing from the current simulation time
    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.state = PlaybackState::Playing;
        // The first delivered frame establishes the wall-clock baseline
        self.last_wall_clock = None;
        self.pending_frame = Some(self.host.request_frame());
        log::debug!("Replay playing from {}", self.simulation_time);
    }

    /// Stop advancing; any outstanding frame is withdrawn
    pub fn pause(&mut self) {
        self.cancel_pending();
        self.state = PlaybackState::Paused;
        self.last_wall_clock = None;
    }

    /// Deliver a frame previously requested from the host.
    ///
    /// Frames that are not the outstanding request are ignored.
    pub fn on_frame(&mut self, request: FrameRequest, now: Instant) -> TickOutcome {
        if self.pending_frame != Some(request) {
            log::trace!("Dropping stale frame {:?}", request);
            return TickOutcome::Ignored;
        }
        self.tick(now)
    }

    /// Advance the clock to wall-clock instant `now`
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Ignored;
        }
        // The outstanding frame is the one being delivered
        if let Some(request) = self.pending_frame.take() {
            self.host.frame_delivered(request);
        }

        let wall_seconds = self
            .last_wall_clock
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last_wall_clock = Some(now);

        let advance_us = (wall_seconds * self.speed_multiplier * 1_000_000.0).round();
        // Advances past the representable range count as reaching the end
        let next = if advance_us < i64::MAX as f64 {
            self.simulation_time
                .checked_add_signed(Duration::microseconds(advance_us as i64))
        } else {
            None
        };

        let Some(next) = next.filter(|next| *next < self.bounds.end) else {
            self.simulation_time = self.bounds.end;
            self.state = PlaybackState::Paused;
            log::info!("Replay reached the end of the race at {}", self.bounds.end);
            return TickOutcome::Finished;
        };

        self.simulation_time = next;
        self.pending_frame = Some(self.host.request_frame());
        TickOutcome::Advanced
    }

    /// Seek to `progress_percent` (0-100) of the timeline and pause
    pub fn scrub(&mut self, progress_percent: f64) {
        self.pause();
        let fraction = progress_percent.clamp(0.0, 100.0) / 100.0;
        let total = self.bounds.duration();
        let offset = match total.num_microseconds() {
            Some(us) => Duration::microseconds((us as f64 * fraction).round() as i64),
            None => {
                let ms = (total.num_milliseconds() as f64 * fraction).round();
                Duration::milliseconds(ms as i64)
            }
        };
        self.simulation_time = self.bounds.clamp(self.bounds.start + offset);
    }

    /// Change playback speed, effective from the next frame
    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        validate_speed(multiplier)?;
        self.speed_multiplier = multiplier;
        Ok(())
    }

    /// Position of the clock along the timeline, 0-100
    pub fn progress_percent(&self) -> f64 {
        let total = self.bounds.duration().num_milliseconds();
        if total <= 0 {
            return 0.0;
        }
        let elapsed = (self.simulation_time - self.bounds.start).num_milliseconds();
        (elapsed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Swap in a new timeline; pauses at its start
    pub fn reset(&mut self, bounds: TimeBounds) {
        self.pause();
        self.bounds = bounds;
        self.simulation_time = bounds.start;
    }

    fn cancel_pending(&mut self) {
        if let Some(request) = self.pending_frame.take() {
            self.host.cancel_frame(request);
        }
    }
}

impl<H: FrameHost> Drop for AnimationScheduler<H> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

fn validate_speed(multiplier: f64) -> Result<()> {
    if multiplier.is_finite() && multiplier > 0.0 {
        Ok(())
    } else {
        Err(ReplayError::InvalidSpeed(multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration as StdDuration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn scheduler(speed: f64) -> AnimationScheduler<PolledFrames> {
        let bounds = TimeBounds::new(at(0), at(100));
        AnimationScheduler::new(PolledFrames::new(), bounds, speed).unwrap()
    }

    #[test]
    fn test_starts_paused_at_start() {
        let clock = scheduler(1.0);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert_eq!(clock.simulation_time(), at(0));
        assert!(clock.pending_frame().is_none());
    }

    #[test]
    fn test_first_tick_does_not_advance() {
        let mut clock = scheduler(10.0);
        clock.play();
        let t0 = Instant::now();
        assert_eq!(clock.tick(t0), TickOutcome::Advanced);
        assert_eq!(clock.simulation_time(), at(0));
    }

    #[test]
    fn test_tick_scales_wall_clock_by_speed() {
        let mut clock = scheduler(10.0);
        clock.play();
        let t0 = Instant::now();
        clock.tick(t0);
        clock.tick(t0 + StdDuration::from_millis(500));
        assert_eq!(clock.simulation_time(), at(5));
        assert!(clock.pending_frame().is_some());
    }

    #[test]
    fn test_tick_past_end_clamps_and_pauses() {
        let mut clock = scheduler(100.0);
        clock.play();
        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + StdDuration::from_secs(5)), TickOutcome::Finished);
        assert_eq!(clock.simulation_time(), at(100));
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert!(clock.pending_frame().is_none());

        // A late frame must not move the clock
        assert_eq!(clock.tick(t0 + StdDuration::from_secs(10)), TickOutcome::Ignored);
        assert_eq!(clock.simulation_time(), at(100));
    }

    #[test]
    fn test_huge_speed_finishes_instead_of_overflowing() {
        let mut clock = scheduler(1e15);
        clock.play();
        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + StdDuration::from_secs(1)), TickOutcome::Finished);
        assert_eq!(clock.simulation_time(), at(100));
        assert_eq!(clock.state(), PlaybackState::Paused);

        let mut clock = scheduler(f64::MAX);
        clock.play();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + StdDuration::from_secs(1)), TickOutcome::Finished);
        assert_eq!(clock.simulation_time(), at(100));
    }

    #[test]
    fn test_host_has_no_pending_frame_after_finish() {
        let mut clock = scheduler(100.0);
        clock.play();
        let t0 = Instant::now();
        let first = clock.host().pending().unwrap();
        assert_eq!(clock.on_frame(first, t0), TickOutcome::Advanced);
        assert_ne!(clock.host().pending(), Some(first));

        let second = clock.host().pending().unwrap();
        let outcome = clock.on_frame(second, t0 + StdDuration::from_secs(5));
        assert_eq!(outcome, TickOutcome::Finished);
        assert!(clock.host().pending().is_none());
        assert!(clock.pending_frame().is_none());
        assert_eq!(clock.host().cancelled(), 0);
    }

    #[test]
    fn test_only_one_outstanding_request() {
        let mut clock = scheduler(1.0);
        clock.play();
        clock.play();
        assert_eq!(clock.host().requested(), 1);

        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.host().requested(), 2);
        assert_eq!(clock.host().pending(), clock.pending_frame());
    }

    #[test]
    fn test_pause_cancels_pending_frame() {
        let mut clock = scheduler(1.0);
        clock.play();
        let request = clock.pending_frame().unwrap();
        clock.pause();
        assert_eq!(clock.host().cancelled(), 1);
        assert!(clock.host().pending().is_none());
        assert_eq!(clock.on_frame(request, Instant::now()), TickOutcome::Ignored);
    }

    #[test]
    fn test_stale_frame_after_replay_is_ignored() {
        let mut clock = scheduler(1.0);
        clock.play();
        let stale = clock.pending_frame().unwrap();
        clock.pause();
        clock.play();
        let t0 = Instant::now();
        assert_eq!(clock.on_frame(stale, t0), TickOutcome::Ignored);
        let current = clock.pending_frame().unwrap();
        assert_eq!(clock.on_frame(current, t0), TickOutcome::Advanced);
    }

    #[test]
    fn test_scrub_pauses_and_seeks() {
        let mut clock = scheduler(1.0);
        clock.play();
        clock.scrub(25.0);
        assert_eq!(clock.state(), PlaybackState::Paused);
        assert_eq!(clock.simulation_time(), at(25));
        assert!(clock.pending_frame().is_none());
        assert!((clock.progress_percent() - 25.0).abs() < 1e-9);

        clock.scrub(100.0);
        assert_eq!(clock.simulation_time(), at(100));
        clock.scrub(0.0);
        assert_eq!(clock.simulation_time(), at(0));
        clock.scrub(250.0);
        assert_eq!(clock.simulation_time(), at(100));
    }

    #[test]
    fn test_set_speed_applies_to_next_tick_only() {
        let mut clock = scheduler(1.0);
        clock.play();
        let t0 = Instant::now();
        clock.tick(t0);
        clock.tick(t0 + StdDuration::from_secs(2));
        assert_eq!(clock.simulation_time(), at(2));

        clock.set_speed(5.0).unwrap();
        assert_eq!(clock.simulation_time(), at(2));
        clock.tick(t0 + StdDuration::from_secs(4));
        assert_eq!(clock.simulation_time(), at(12));
    }

    #[test]
    fn test_rejects_bad_speed() {
        let mut clock = scheduler(2.0);
        assert!(matches!(clock.set_speed(0.0), Err(ReplayError::InvalidSpeed(_))));
        assert!(clock.set_speed(-1.0).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
        assert_eq!(clock.speed_multiplier(), 2.0);
        let bounds = TimeBounds::new(at(0), at(1));
        assert!(AnimationScheduler::new(PolledFrames::new(), bounds, 0.0).is_err());
    }

    #[test]
    fn test_reset_moves_to_new_start() {
        let mut clock = scheduler(1.0);
        clock.scrub(50.0);
        clock.reset(TimeBounds::new(at(500), at(600)));
        assert_eq!(clock.simulation_time(), at(500));
        assert_eq!(clock.progress_percent(), 0.0);
    }

    struct SharedHost(Rc<RefCell<Vec<String>>>);

    impl FrameHost for SharedHost {
        fn request_frame(&mut self) -> FrameRequest {
            let mut log = self.0.borrow_mut();
            log.push("request".to_string());
            FrameRequest(log.len() as u64)
        }

        fn cancel_frame(&mut self, request: FrameRequest) {
            self.0.borrow_mut().push(format!("cancel {}", request.0));
        }
    }

    #[test]
    fn test_drop_withdraws_pending_frame() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        {
            let mut clock = AnimationScheduler::new(
                SharedHost(Rc::clone(&calls)),
                TimeBounds::new(at(0), at(10)),
                1.0,
            )
            .unwrap();
            clock.play();
        }
        assert_eq!(*calls.borrow(), vec!["request".to_string(), "cancel 1".to_string()]);
    }
}
