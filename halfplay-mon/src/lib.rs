//! # halfplay Monitor Library (halfplay-mon)
//!
//! Tracks what an MPD server is playing and raises a one-shot `HalfPlayed`
//! event once a track has played for half of its duration.
//!
//! **Data flow:** server change notification → `ChangeDispatcher` →
//! `SnapshotFetcher` → `CurrentTrackRegister` compare/update → (on change)
//! `HalfPlayNotifier` re-arm. The `LivenessKeeper` pings alongside.

pub mod dispatcher;
pub mod liveness;
pub mod monitor;
pub mod mpd;
pub mod notifier;
pub mod register;
pub mod server;
pub mod snapshot;

pub use dispatcher::{ChangeDispatcher, DispatchOutcome};
pub use monitor::{MonitorHandle, MonitorSettings};
pub use register::CurrentTrackRegister;
pub use server::{MediaServer, ServerEvents, StatusReport, TrackInfo};
pub use snapshot::{PlaybackSnapshot, SnapshotFetcher};
