//! RaceViz - race replay backend
//!
//! The replay engine lives in [`replay`] and has no GUI dependencies. With
//! the `desktop` feature the crate also provides the Tauri commands the
//! map frontend calls once per animation frame.

pub mod replay;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Mutex;
    use std::time::Instant;

    use chrono::{DateTime, Utc};
    use tauri::{Manager, State};

    use crate::replay::session::{RacerStats, ReplayConfig, ReplaySession, ReplaySnapshot, Timeline};
    use crate::replay::track_loader::{self, EventType, RacerEntry};
    use crate::replay::{PolledFrames, RacerId, RacerProgress, TrackPath};

    type Session = Mutex<ReplaySession<PolledFrames>>;

    /// Start over with a new configuration, dropping any loaded event
    #[tauri::command]
    fn reset_replay(
        session: State<'_, Session>,
        speed_multiplier: Option<f64>,
        event_type: Option<EventType>,
        event_start: Option<DateTime<Utc>>,
        event_end: Option<DateTime<Utc>>,
    ) -> Result<(), String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;

        let defaults = ReplayConfig::default();
        let config = ReplayConfig {
            speed_multiplier: speed_multiplier.unwrap_or(defaults.speed_multiplier),
            event_type: event_type.unwrap_or(defaults.event_type),
            event_start,
            event_end,
        };

        *session = ReplaySession::new(PolledFrames::new(), config).map_err(|e| e.to_string())?;
        log::info!("Replay reset");
        Ok(())
    }

    /// Load already-processed tracks for the current event
    #[tauri::command]
    fn load_event(session: State<'_, Session>, tracks: Vec<TrackPath>) -> Result<Timeline, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.load(tracks).map_err(|e| e.to_string())?;
        Ok(session.timeline())
    }

    /// Parse racers' GPX files and load them as the current event
    #[tauri::command]
    fn load_gpx_files(
        session: State<'_, Session>,
        racers: Vec<RacerEntry>,
    ) -> Result<Timeline, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        let event_type = session.config().event_type;
        let tracks = track_loader::load_event_tracks(&racers, event_type, &mut rand::thread_rng());
        session.load(tracks).map_err(|e| e.to_string())?;
        Ok(session.timeline())
    }

    #[tauri::command]
    fn play(session: State<'_, Session>) -> Result<ReplaySnapshot, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.play();
        Ok(session.snapshot())
    }

    #[tauri::command]
    fn pause(session: State<'_, Session>) -> Result<ReplaySnapshot, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.pause();
        Ok(session.snapshot())
    }

    /// Seek to a percentage of the timeline; always pauses
    #[tauri::command]
    fn scrub(session: State<'_, Session>, progress_percent: f64) -> Result<ReplaySnapshot, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.scrub(progress_percent);
        Ok(session.snapshot())
    }

    #[tauri::command]
    fn set_speed(session: State<'_, Session>, multiplier: f64) -> Result<(), String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.set_speed(multiplier).map_err(|e| e.to_string())
    }

    /// Deliver one animation frame and return the refreshed state
    #[tauri::command]
    fn tick(session: State<'_, Session>) -> Result<ReplaySnapshot, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        let (_, snapshot) = session.tick(Instant::now());
        Ok(snapshot)
    }

    /// Current state without advancing the clock
    #[tauri::command]
    fn get_snapshot(session: State<'_, Session>) -> Result<ReplaySnapshot, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        Ok(session.snapshot())
    }

    #[tauri::command]
    fn get_leaderboard(session: State<'_, Session>) -> Result<Vec<RacerProgress>, String> {
        let session = session.lock().map_err(|e| e.to_string())?;
        Ok(session.leaderboard())
    }

    #[tauri::command]
    fn get_racer_stats(session: State<'_, Session>, racer_id: i64) -> Result<RacerStats, String> {
        let mut session = session.lock().map_err(|e| e.to_string())?;
        session.racer_stats(RacerId(racer_id)).map_err(|e| e.to_string())
    }

    #[tauri::command]
    fn get_timeline(session: State<'_, Session>) -> Result<Timeline, String> {
        let session = session.lock().map_err(|e| e.to_string())?;
        Ok(session.timeline())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        tauri::Builder::default()
            .setup(|app| {
                if cfg!(debug_assertions) {
                    app.handle().plugin(
                        tauri_plugin_log::Builder::default()
                            .level(log::LevelFilter::Info)
                            .build(),
                    )?;
                }
                let session = ReplaySession::new(PolledFrames::new(), ReplayConfig::default())?;
                app.manage(Mutex::new(session));
                log::info!("RaceViz replay engine initialized");
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                reset_replay,
                load_event,
                load_gpx_files,
                play,
                pause,
                scrub,
                set_speed,
                tick,
                get_snapshot,
                get_leaderboard,
                get_racer_stats,
                get_timeline,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "desktop")]
pub use desktop::run;
