//! Current-track register
//!
//! Single authoritative record of the track believed to be playing, together
//! with the pending half-play timer for it. Both live behind one async mutex
//! so "compare, replace, cancel old timer, arm new timer" is one step.
//!
//! Updates carry the sequence number assigned when their notification was
//! received. An update older than the last applied one is discarded, so
//! fetches that complete out of order cannot roll the register back.

use tokio::sync::Mutex;

use crate::notifier::TimerHandle;

/// Result of applying an observation to the register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterUpdate {
    /// Same track as before; nothing written
    Unchanged,
    /// Register now holds the new track
    Changed {
        /// Previously registered track (None before the first write)
        previous: Option<String>,
    },
    /// A newer observation was already applied
    Stale,
}

#[derive(Default)]
struct Slot {
    track: Option<String>,
    pending: Option<TimerHandle>,
    applied_seq: u64,
    writes: u64,
}

/// Mutex-guarded current-track cell
#[derive(Default)]
pub struct CurrentTrackRegister {
    slot: Mutex<Slot>,
}

impl CurrentTrackRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written track identity
    pub async fn current(&self) -> Option<String> {
        self.slot.lock().await.track.clone()
    }

    /// Overwrite the stored identity
    pub async fn publish(&self, track: impl Into<String>) {
        let mut slot = self.slot.lock().await;
        slot.track = Some(track.into());
        slot.writes += 1;
    }

    /// Read the stored identity and overwrite it in one step
    pub async fn take_and_replace(&self, track: impl Into<String>) -> Option<String> {
        let mut slot = self.slot.lock().await;
        slot.writes += 1;
        slot.track.replace(track.into())
    }

    /// Number of identity writes since creation
    pub async fn write_count(&self) -> u64 {
        self.slot.lock().await.writes
    }

    /// Track of the live (armed, not cancelled) timer, if any
    pub async fn pending_track(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.pending
            .as_ref()
            .filter(|timer| !timer.is_cancelled())
            .map(|timer| timer.track().to_string())
    }

    /// Compare `track` with the register and, if different, replace it
    ///
    /// On change the previous timer is cancelled before `on_change` runs;
    /// `on_change` receives the previous identity and returns the timer to
    /// keep for the new track. Everything happens under the register lock.
    pub async fn apply<F>(&self, seq: u64, track: &str, on_change: F) -> RegisterUpdate
    where
        F: FnOnce(Option<&str>) -> Option<TimerHandle>,
    {
        let mut slot = self.slot.lock().await;

        if seq < slot.applied_seq {
            return RegisterUpdate::Stale;
        }
        slot.applied_seq = seq;

        if slot.track.as_deref() == Some(track) {
            return RegisterUpdate::Unchanged;
        }

        let previous = slot.track.replace(track.to_string());
        slot.writes += 1;

        if let Some(old) = slot.pending.take() {
            old.cancel();
        }
        slot.pending = on_change(previous.as_deref());

        RegisterUpdate::Changed { previous }
    }

    /// Cancel the pending timer and wait for its task to exit
    pub async fn clear_pending(&self) {
        let pending = self.slot.lock().await.pending.take();
        if let Some(timer) = pending {
            timer.cancel_and_wait().await;
        }
    }
}
