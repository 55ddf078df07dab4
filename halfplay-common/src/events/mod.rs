//! Event types for the halfplay event system
//!
//! Provides the event definitions produced by the tracker and the EventBus
//! that fans them out to the logging shell (and tests).

mod playback_types;

pub use playback_types::PlaybackMode;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events produced by the playback tracker
///
/// Serialized with an internal `type` tag so a shell can emit them as JSON lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MonitorEvent {
    /// The register moved to a different track
    ///
    /// Also emitted once at startup for the initial snapshot.
    TrackChanged {
        /// Track identity ("<title> by <artist>", or "Nothing")
        track: String,
        /// When the change was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track reached half of its total duration
    ///
    /// Emitted at most once per armed timer.
    HalfPlayed {
        /// Track identity the timer was armed for
        track: String,
        /// Threshold that was reached, in whole seconds
        threshold_secs: u64,
        /// When the check fired
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Passthrough of a non-fatal upstream failure
    UpstreamError {
        /// Rendered error message
        message: String,
        /// When the failure was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MonitorEvent {
    /// Build a TrackChanged event stamped now
    pub fn track_changed(track: impl Into<String>) -> Self {
        MonitorEvent::TrackChanged {
            track: track.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build a HalfPlayed event stamped now
    pub fn half_played(track: impl Into<String>, threshold_secs: u64) -> Self {
        MonitorEvent::HalfPlayed {
            track: track.into(),
            threshold_secs,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Build an UpstreamError event from any displayable error
    pub fn upstream_error(err: impl std::fmt::Display) -> Self {
        MonitorEvent::UpstreamError {
            message: err.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Broadcast bus for MonitorEvent
///
/// Cloning the bus shares the same underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use halfplay_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// let mut rx = event_bus.subscribe();
    /// assert!(rx.try_recv().is_err());
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of receivers if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MonitorEvent,
    ) -> Result<usize, broadcast::error::SendError<MonitorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }
}
