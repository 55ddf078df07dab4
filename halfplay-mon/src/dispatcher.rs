//! Change dispatcher
//!
//! Turns "player subsystem changed" notifications into register updates:
//! fetch a snapshot, compare it with the register, and on change swap the
//! half-play timer. Each notification is numbered on receipt; the fetch runs
//! without holding the register lock, the compare-and-update runs under it.

use halfplay_common::{Error, EventBus, MonitorEvent, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notifier::{HalfPlayNotifier, TimerHandle};
use crate::register::{CurrentTrackRegister, RegisterUpdate};
use crate::server::{MediaServer, PLAYER_SUBSYSTEM};
use crate::snapshot::{PlaybackSnapshot, SnapshotFetcher};

/// What handling one notification did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a player notification
    Ignored,
    /// Same track as the register holds
    Unchanged,
    /// Register moved to `current`
    Changed {
        previous: Option<String>,
        current: String,
    },
    /// A later notification was applied first
    Stale,
    /// The snapshot fetch failed; register untouched
    Failed,
}

pub struct ChangeDispatcher<S> {
    fetcher: SnapshotFetcher<S>,
    notifier: HalfPlayNotifier<S>,
    register: Arc<CurrentTrackRegister>,
    events: EventBus,
    received: AtomicU64,
}

impl<S: MediaServer> ChangeDispatcher<S> {
    pub fn new(
        fetcher: SnapshotFetcher<S>,
        register: Arc<CurrentTrackRegister>,
        events: EventBus,
    ) -> Self {
        let notifier = HalfPlayNotifier::new(fetcher.clone(), events.clone());
        Self {
            fetcher,
            notifier,
            register,
            events,
            received: AtomicU64::new(0),
        }
    }

    pub fn register(&self) -> &Arc<CurrentTrackRegister> {
        &self.register
    }

    /// Seed the register from the first snapshot
    ///
    /// Emits `TrackChanged` for the initial track and arms its timer.
    pub async fn initialize(&self) -> Result<PlaybackSnapshot> {
        let seq = self.next_seq();
        let snapshot = self
            .fetcher
            .fetch()
            .await
            .map_err(|e| Error::Startup(format!("initial status: {}", e)))?;

        debug!("Initial track: {}", snapshot.track);
        self.apply_snapshot(seq, &snapshot).await;
        Ok(snapshot)
    }

    /// Handle one subsystem-change notification
    pub async fn handle_change(&self, subsystem: &str) -> DispatchOutcome {
        if subsystem != PLAYER_SUBSYSTEM {
            debug!("Ignoring {} notification", subsystem);
            return DispatchOutcome::Ignored;
        }

        let seq = self.next_seq();
        match self.fetcher.fetch().await {
            Ok(snapshot) => self.apply_snapshot(seq, &snapshot).await,
            Err(e) => {
                warn!("Status fetch for notification #{} failed: {}", seq, e);
                self.events.emit_lossy(MonitorEvent::upstream_error(&e));
                DispatchOutcome::Failed
            }
        }
    }

    /// Consume notifications one at a time until the stream ends or shutdown
    ///
    /// A closed stream means the server subscription is gone, which is an
    /// upstream failure for the caller to act on.
    pub async fn run(
        &self,
        mut changes: mpsc::UnboundedReceiver<String>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Change dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Change dispatcher stopped");
                    return Ok(());
                }
                next = changes.recv() => match next {
                    Some(subsystem) => {
                        let outcome = self.handle_change(&subsystem).await;
                        debug!("Notification {}: {:?}", subsystem, outcome);
                    }
                    None => {
                        return Err(Error::Upstream("change notification stream closed".to_string()));
                    }
                },
            }
        }
    }

    fn next_seq(&self) -> u64 {
        self.received.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn apply_snapshot(&self, seq: u64, snapshot: &PlaybackSnapshot) -> DispatchOutcome {
        let update = self
            .register
            .apply(seq, &snapshot.track, |_previous| {
                debug!("Track changed: {}", snapshot.track);
                self.events
                    .emit_lossy(MonitorEvent::track_changed(&snapshot.track));
                self.arm_for(snapshot)
            })
            .await;

        match update {
            RegisterUpdate::Unchanged => {
                debug!("Nothing changed");
                DispatchOutcome::Unchanged
            }
            RegisterUpdate::Changed { previous } => DispatchOutcome::Changed {
                previous,
                current: snapshot.track.clone(),
            },
            RegisterUpdate::Stale => {
                debug!("Discarding stale snapshot from notification #{}", seq);
                DispatchOutcome::Stale
            }
        }
    }

    fn arm_for(&self, snapshot: &PlaybackSnapshot) -> Option<TimerHandle> {
        if !snapshot.is_armable() {
            debug!("No half-play timer for {}", snapshot.track);
            return None;
        }
        match self.notifier.arm(snapshot) {
            Ok(timer) => Some(timer),
            Err(e) => {
                warn!("Not arming half-play timer for {}: {}", snapshot.track, e);
                None
            }
        }
    }
}
