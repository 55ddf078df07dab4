//! Playback-related type definitions

use serde::{Deserialize, Serialize};

/// Playback mode as reported by the media server
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackMode {
    /// Whether a track is loaded (playing or paused)
    pub fn has_track(&self) -> bool {
        !matches!(self, PlaybackMode::Stopped)
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Playing => write!(f, "playing"),
            PlaybackMode::Paused => write!(f, "paused"),
            PlaybackMode::Stopped => write!(f, "stopped"),
        }
    }
}
