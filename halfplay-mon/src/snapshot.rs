//! Status snapshot fetcher
//!
//! Normalizes the server's status and current-track answers into a single
//! immutable `PlaybackSnapshot`.

use halfplay_common::config::PausedIdentity;
use halfplay_common::{Error, PlaybackMode, Result};
use std::sync::Arc;
use tracing::debug;

use crate::server::MediaServer;

/// Identity reported when nothing is playing
pub const NOTHING: &str = "Nothing";
/// Identity reported for paused playback under `PausedIdentity::Placeholder`
pub const PAUSED_PLACEHOLDER: &str = "paused";

/// Point-in-time read of playback state
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    /// "<title> by <artist>", or a sentinel
    pub track: String,
    /// Total duration in seconds; None when not meaningful (stopped, streams)
    pub total_duration: Option<f64>,
    /// Elapsed seconds (informational, may briefly exceed total during seeks)
    pub elapsed: f64,
    pub mode: PlaybackMode,
}

impl PlaybackSnapshot {
    /// Snapshot for a stopped server
    pub fn stopped() -> Self {
        Self {
            track: NOTHING.to_string(),
            total_duration: None,
            elapsed: 0.0,
            mode: PlaybackMode::Stopped,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.mode == PlaybackMode::Stopped
    }

    /// Whether the identity names an actual track rather than a sentinel
    pub fn is_armable(&self) -> bool {
        self.mode.has_track() && self.track != NOTHING && self.track != PAUSED_PLACEHOLDER
    }
}

/// Builds snapshots from the media server
pub struct SnapshotFetcher<S> {
    server: Arc<S>,
    paused_identity: PausedIdentity,
}

impl<S> Clone for SnapshotFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            paused_identity: self.paused_identity,
        }
    }
}

impl<S: MediaServer> SnapshotFetcher<S> {
    pub fn new(server: Arc<S>, paused_identity: PausedIdentity) -> Self {
        Self {
            server,
            paused_identity,
        }
    }

    /// Query status (and track metadata when a track is loaded)
    pub async fn fetch(&self) -> Result<PlaybackSnapshot> {
        let status = self.server.status().await?;

        let track = match status.mode {
            PlaybackMode::Stopped => return Ok(PlaybackSnapshot::stopped()),
            PlaybackMode::Paused if self.paused_identity == PausedIdentity::Placeholder => {
                PAUSED_PLACEHOLDER.to_string()
            }
            PlaybackMode::Playing | PlaybackMode::Paused => {
                match self.server.current_track().await? {
                    Some(info) => info.identity(),
                    None => NOTHING.to_string(),
                }
            }
        };

        let snapshot = PlaybackSnapshot {
            track,
            total_duration: status.duration,
            elapsed: status.elapsed.unwrap_or(0.0),
            mode: status.mode,
        };
        debug!(
            "Snapshot: {} [{}] {:.1}/{:?}s",
            snapshot.track, snapshot.mode, snapshot.elapsed, snapshot.total_duration
        );
        Ok(snapshot)
    }

    /// Re-query only the elapsed time
    ///
    /// A loaded track without an elapsed field is malformed upstream data.
    pub async fn elapsed_seconds(&self) -> Result<f64> {
        let status = self.server.status().await?;
        match (status.mode, status.elapsed) {
            (PlaybackMode::Stopped, _) => Ok(0.0),
            (_, Some(elapsed)) if elapsed.is_finite() => Ok(elapsed),
            (_, Some(elapsed)) => Err(Error::Parse {
                field: "elapsed",
                value: elapsed.to_string(),
            }),
            (_, None) => Err(Error::Parse {
                field: "elapsed",
                value: "missing".to_string(),
            }),
        }
    }
}
