//! Scriptable in-memory media server

use async_trait::async_trait;
use halfplay_common::{Error, PlaybackMode, Result};
use halfplay_mon::server::{MediaServer, ServerEvents, StatusReport, TrackInfo};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

struct ServerState {
    status: StatusReport,
    track: Option<TrackInfo>,
    status_failures: usize,
    track_failures: usize,
    ping_failures: usize,
    track_delays: VecDeque<Duration>,
}

/// MediaServer whose answers are set by the test
pub struct ScriptedServer {
    state: Mutex<ServerState>,
    status_calls: AtomicUsize,
    track_calls: AtomicUsize,
    ping_calls: AtomicUsize,
}

impl Default for ScriptedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedServer {
    /// Starts stopped
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                status: StatusReport::stopped(),
                track: None,
                status_failures: 0,
                track_failures: 0,
                ping_failures: 0,
                track_delays: VecDeque::new(),
            }),
            status_calls: AtomicUsize::new(0),
            track_calls: AtomicUsize::new(0),
            ping_calls: AtomicUsize::new(0),
        }
    }

    /// Server playing `title` by "Artist"
    pub fn playing(title: &str, duration: f64) -> Self {
        let server = Self::new();
        server.set_playing(title, duration, 0.0);
        server
    }

    pub fn set_playing(&self, title: &str, duration: f64, elapsed: f64) {
        self.set_loaded(PlaybackMode::Playing, title, Some(duration), elapsed);
    }

    pub fn set_paused(&self, title: &str, duration: f64, elapsed: f64) {
        self.set_loaded(PlaybackMode::Paused, title, Some(duration), elapsed);
    }

    /// Playing a track whose duration the server does not report
    pub fn set_playing_without_duration(&self, title: &str) {
        self.set_loaded(PlaybackMode::Playing, title, None, 0.0);
    }

    pub fn set_stopped(&self) {
        let mut state = self.state.lock().unwrap();
        state.status = StatusReport::stopped();
        state.track = None;
    }

    pub fn set_elapsed(&self, elapsed: f64) {
        self.state.lock().unwrap().status.elapsed = Some(elapsed);
    }

    /// Playing, but with an empty current-song answer
    pub fn set_playing_no_song(&self) {
        let mut state = self.state.lock().unwrap();
        state.status = StatusReport {
            mode: PlaybackMode::Playing,
            duration: None,
            elapsed: None,
        };
        state.track = None;
    }

    pub fn set_status(&self, status: StatusReport) {
        self.state.lock().unwrap().status = status;
    }

    pub fn fail_next_status(&self, count: usize) {
        self.state.lock().unwrap().status_failures = count;
    }

    pub fn fail_next_track(&self, count: usize) {
        self.state.lock().unwrap().track_failures = count;
    }

    pub fn fail_next_pings(&self, count: usize) {
        self.state.lock().unwrap().ping_failures = count;
    }

    /// Delay the next current-track answer (the answer is captured before the delay)
    pub fn delay_next_track(&self, delay: Duration) {
        self.state.lock().unwrap().track_delays.push_back(delay);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn track_calls(&self) -> usize {
        self.track_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    fn set_loaded(&self, mode: PlaybackMode, title: &str, duration: Option<f64>, elapsed: f64) {
        let mut state = self.state.lock().unwrap();
        state.status = StatusReport {
            mode,
            duration,
            elapsed: Some(elapsed),
        };
        state.track = Some(TrackInfo::new(title, "Artist"));
    }
}

#[async_trait]
impl MediaServer for ScriptedServer {
    async fn status(&self) -> Result<StatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.status_failures > 0 {
            state.status_failures -= 1;
            return Err(Error::Upstream("status: connection reset".to_string()));
        }
        Ok(state.status.clone())
    }

    async fn current_track(&self) -> Result<Option<TrackInfo>> {
        self.track_calls.fetch_add(1, Ordering::SeqCst);
        let (answer, delay) = {
            let mut state = self.state.lock().unwrap();
            if state.track_failures > 0 {
                state.track_failures -= 1;
                return Err(Error::Upstream("current song: broken pipe".to_string()));
            }
            (state.track.clone(), state.track_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(answer)
    }

    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.ping_failures > 0 {
            state.ping_failures -= 1;
            return Err(Error::Upstream("ping: timeout".to_string()));
        }
        Ok(())
    }
}

/// Subscription channels plus the test-side senders
pub struct ScriptedSubscription {
    pub changes: mpsc::UnboundedSender<String>,
    pub errors: mpsc::UnboundedSender<Error>,
}

pub fn subscription() -> (ScriptedSubscription, ServerEvents) {
    let (change_tx, changes) = mpsc::unbounded_channel();
    let (error_tx, errors) = mpsc::unbounded_channel();
    (
        ScriptedSubscription {
            changes: change_tx,
            errors: error_tx,
        },
        ServerEvents { changes, errors },
    )
}
