//! Liveness keeper
//!
//! One recurring task that pings the server so an idle connection is not
//! dropped. Stops when its shutdown token is cancelled.

use halfplay_common::config::{LivenessMode, MonitorConfig};
use halfplay_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::server::MediaServer;

/// Reaction to a failed ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessPolicy {
    /// First failure is fatal
    Abort,
    /// Retry `retries` times, doubling the delay from `initial`
    Backoff { retries: u32, initial: Duration },
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        LivenessPolicy::Backoff {
            retries: 3,
            initial: Duration::from_secs(1),
        }
    }
}

impl From<&MonitorConfig> for LivenessPolicy {
    fn from(config: &MonitorConfig) -> Self {
        match config.liveness {
            LivenessMode::Abort => LivenessPolicy::Abort,
            LivenessMode::Backoff => LivenessPolicy::Backoff {
                retries: config.liveness_retries,
                initial: config.liveness_backoff(),
            },
        }
    }
}

pub struct LivenessKeeper<S> {
    server: Arc<S>,
    interval: Duration,
    policy: LivenessPolicy,
}

impl<S: MediaServer> LivenessKeeper<S> {
    pub fn new(server: Arc<S>, interval: Duration, policy: LivenessPolicy) -> Self {
        Self {
            server,
            interval,
            policy,
        }
    }

    /// Ping every interval until shutdown
    ///
    /// Returns `Error::Fatal` once the policy gives up on a failing server.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Liveness keeper started ({:?} interval)", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Liveness keeper stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            self.keep_alive(&shutdown).await?;
        }
    }

    async fn keep_alive(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut last_error = match self.server.ping().await {
            Ok(()) => {
                debug!("Ping ok");
                return Ok(());
            }
            Err(e) => e,
        };

        let (retries, mut delay) = match self.policy {
            LivenessPolicy::Abort => {
                error!("Ping failed: {}", last_error);
                return Err(Error::Fatal(format!("ping: {}", last_error)));
            }
            LivenessPolicy::Backoff { retries, initial } => (retries, initial),
        };

        for attempt in 1..=retries {
            warn!(
                "Ping failed ({}), retry {}/{} in {:?}",
                last_error, attempt, retries, delay
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                _ = time::sleep(delay) => {}
            }

            match self.server.ping().await {
                Ok(()) => {
                    info!("Ping recovered on retry {}", attempt);
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
            delay = delay.saturating_mul(2);
        }

        error!("Ping failed after {} retries: {}", retries, last_error);
        Err(Error::Fatal(format!(
            "ping failed after {} retries: {}",
            retries, last_error
        )))
    }
}
