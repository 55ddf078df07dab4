//! Media server collaborator interface
//!
//! The tracker only needs four things from the server: a status query, a
//! current-track query, a ping, and a subscription to subsystem changes.
//! `MpdServer` implements this against a real MPD; tests script it in memory.

use async_trait::async_trait;
use halfplay_common::{PlaybackMode, Result};
use tokio::sync::mpsc;

/// Subsystem name MPD uses for play/pause/stop/seek/song changes
pub const PLAYER_SUBSYSTEM: &str = "player";

/// Raw playback status as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub mode: PlaybackMode,
    /// Total duration in seconds (None when the server has none, e.g. streams)
    pub duration: Option<f64>,
    /// Elapsed time in seconds
    pub elapsed: Option<f64>,
}

impl StatusReport {
    pub fn stopped() -> Self {
        Self {
            mode: PlaybackMode::Stopped,
            duration: None,
            elapsed: None,
        }
    }
}

/// Metadata of the currently loaded song
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
        }
    }

    /// Stable identity label: "<title> by <artist>"
    ///
    /// Missing tags render as empty strings.
    pub fn identity(&self) -> String {
        format!(
            "{} by {}",
            self.title.as_deref().unwrap_or_default(),
            self.artist.as_deref().unwrap_or_default()
        )
    }
}

/// Subscription channels handed out when connecting
pub struct ServerEvents {
    /// Subsystem names, one per change notification
    pub changes: mpsc::UnboundedReceiver<String>,
    /// Errors observed on the subscription
    pub errors: mpsc::UnboundedReceiver<halfplay_common::Error>,
}

/// Queries the tracker issues against the media server
#[async_trait]
pub trait MediaServer: Send + Sync + 'static {
    /// Current playback mode, duration and elapsed time
    async fn status(&self) -> Result<StatusReport>;

    /// Title/artist of the loaded song (None if the queue position is empty)
    async fn current_track(&self) -> Result<Option<TrackInfo>>;

    /// Keep-alive round trip
    async fn ping(&self) -> Result<()>;
}
