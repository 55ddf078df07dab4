//! Half-duration notifier
//!
//! Arms one deferred check per track. When the check fires it re-queries the
//! elapsed time and emits `HalfPlayed` if the track reached half of its
//! duration. Cancelling and the fire-time check-and-emit share one mutex, so
//! a timer whose `cancel()` has returned can never emit.

use halfplay_common::{Error, EventBus, MonitorEvent, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::server::MediaServer;
use crate::snapshot::{PlaybackSnapshot, SnapshotFetcher};

/// Half of the total duration in whole seconds, rounded down
///
/// Negative durations clamp to 0. Missing or non-finite durations cannot be
/// armed and yield `Error::Parse`.
pub fn half_threshold(total_duration: Option<f64>) -> Result<u64> {
    match total_duration {
        None => Err(Error::Parse {
            field: "duration",
            value: "missing".to_string(),
        }),
        Some(total) if !total.is_finite() => Err(Error::Parse {
            field: "duration",
            value: total.to_string(),
        }),
        Some(total) if total <= 0.0 => Ok(0),
        Some(total) => Ok((total / 2.0).floor() as u64),
    }
}

/// Delay until the threshold, counted from the arming snapshot's position
fn arming_delay(threshold_secs: u64, elapsed: f64) -> Duration {
    let already = elapsed.max(0.0).floor() as u64;
    Duration::from_secs(threshold_secs.saturating_sub(already))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Armed,
    Fired,
    Cancelled,
}

fn lock_state(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one armed half-duration check
pub struct TimerHandle {
    track: String,
    threshold_secs: u64,
    state: Arc<Mutex<TimerState>>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Track identity this timer was armed for
    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }

    /// Invalidate the timer
    ///
    /// Returns true if this call prevented the firing; false if the timer had
    /// already fired or been cancelled.
    pub fn cancel(&self) -> bool {
        let prevented = {
            let mut state = lock_state(&self.state);
            if *state == TimerState::Armed {
                *state = TimerState::Cancelled;
                true
            } else {
                false
            }
        };
        self.token.cancel();
        if prevented {
            debug!("Half-play timer cancelled for {}", self.track);
        }
        prevented
    }

    pub fn is_cancelled(&self) -> bool {
        *lock_state(&self.state) == TimerState::Cancelled
    }

    /// Whether the background check has completed (fired, skipped or cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the background task to exit
    pub async fn cancel_and_wait(self) {
        self.cancel();
        let _ = self.task.await;
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("track", &self.track)
            .field("threshold_secs", &self.threshold_secs)
            .field("state", &*lock_state(&self.state))
            .finish()
    }
}

/// Arms half-duration checks
pub struct HalfPlayNotifier<S> {
    fetcher: SnapshotFetcher<S>,
    events: EventBus,
}

impl<S: MediaServer> HalfPlayNotifier<S> {
    pub fn new(fetcher: SnapshotFetcher<S>, events: EventBus) -> Self {
        Self { fetcher, events }
    }

    /// Schedule the half-duration check for `snapshot`'s track
    pub fn arm(&self, snapshot: &PlaybackSnapshot) -> Result<TimerHandle> {
        let threshold_secs = half_threshold(snapshot.total_duration)?;
        let delay = arming_delay(threshold_secs, snapshot.elapsed);

        let state = Arc::new(Mutex::new(TimerState::Armed));
        let token = CancellationToken::new();

        let check = HalfPlayCheck {
            fetcher: self.fetcher.clone(),
            events: self.events.clone(),
            track: snapshot.track.clone(),
            threshold_secs,
            state: Arc::clone(&state),
            token: token.clone(),
        };
        let task = tokio::spawn(check.run(delay));

        debug!(
            "Half-play timer armed for {}: threshold {}s, firing in {:?}",
            snapshot.track, threshold_secs, delay
        );

        Ok(TimerHandle {
            track: snapshot.track.clone(),
            threshold_secs,
            state,
            token,
            task,
        })
    }
}

/// State moved into the spawned check task
struct HalfPlayCheck<S> {
    fetcher: SnapshotFetcher<S>,
    events: EventBus,
    track: String,
    threshold_secs: u64,
    state: Arc<Mutex<TimerState>>,
    token: CancellationToken,
}

impl<S: MediaServer> HalfPlayCheck<S> {
    async fn run(self, delay: Duration) {
        // Nothing to reach for a zero-length track
        if self.threshold_secs == 0 {
            self.settle(|| debug!("Zero threshold for {}, nothing to report", self.track));
            return;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let elapsed = tokio::select! {
            biased;
            _ = self.token.cancelled() => return,
            result = self.fetcher.elapsed_seconds() => result,
        };

        match elapsed {
            Ok(elapsed) if elapsed.floor() >= self.threshold_secs as f64 => {
                self.settle(|| {
                    debug!("Half-way reached: {}", self.track);
                    self.events
                        .emit_lossy(MonitorEvent::half_played(&self.track, self.threshold_secs));
                });
            }
            Ok(elapsed) => {
                self.settle(|| {
                    debug!(
                        "{} at {:.1}s, below threshold {}s",
                        self.track, elapsed, self.threshold_secs
                    )
                });
            }
            Err(e) => {
                self.settle(|| {
                    warn!("Half-play check for {} failed: {}", self.track, e);
                    self.events.emit_lossy(MonitorEvent::upstream_error(&e));
                });
            }
        }
    }

    /// Run `effect` only if the timer is still armed, marking it fired
    fn settle(&self, effect: impl FnOnce()) {
        let mut state = lock_state(&self.state);
        if *state == TimerState::Armed {
            *state = TimerState::Fired;
            effect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_half_rounded_down() {
        assert_eq!(half_threshold(Some(200.0)).unwrap(), 100);
        assert_eq!(half_threshold(Some(201.9)).unwrap(), 100);
        assert_eq!(half_threshold(Some(1.5)).unwrap(), 0);
    }

    #[test]
    fn test_threshold_zero_and_negative() {
        assert_eq!(half_threshold(Some(0.0)).unwrap(), 0);
        assert_eq!(half_threshold(Some(-12.0)).unwrap(), 0);
    }

    #[test]
    fn test_threshold_rejects_unusable_duration() {
        assert!(matches!(
            half_threshold(None),
            Err(Error::Parse { field: "duration", .. })
        ));
        assert!(matches!(
            half_threshold(Some(f64::NAN)),
            Err(Error::Parse { field: "duration", .. })
        ));
        assert!(matches!(
            half_threshold(Some(f64::INFINITY)),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_arming_delay_accounts_for_elapsed() {
        assert_eq!(arming_delay(100, 0.0), Duration::from_secs(100));
        assert_eq!(arming_delay(100, 30.7), Duration::from_secs(70));
        assert_eq!(arming_delay(100, 150.0), Duration::ZERO);
        assert_eq!(arming_delay(100, -3.0), Duration::from_secs(100));
    }
}
