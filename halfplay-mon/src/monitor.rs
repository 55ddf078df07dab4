//! Background monitoring tasks
//!
//! Seeds the register, then runs the change dispatcher, the error forwarder
//! and the liveness keeper until one of them ends or shutdown is requested.

use halfplay_common::config::{MonitorConfig, PausedIdentity};
use halfplay_common::{Error, EventBus, MonitorEvent, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::ChangeDispatcher;
use crate::liveness::{LivenessKeeper, LivenessPolicy};
use crate::register::CurrentTrackRegister;
use crate::server::{MediaServer, ServerEvents};
use crate::snapshot::SnapshotFetcher;

/// Runtime knobs for the monitor
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub keepalive_interval: Duration,
    pub paused_identity: PausedIdentity,
    pub liveness: LivenessPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            paused_identity: PausedIdentity::default(),
            liveness: LivenessPolicy::default(),
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval(),
            paused_identity: config.paused_identity,
            liveness: LivenessPolicy::from(config),
        }
    }
}

/// Running monitor
pub struct MonitorHandle {
    shutdown: CancellationToken,
    tasks: JoinSet<Result<()>>,
    register: Arc<CurrentTrackRegister>,
}

/// Seed the register and start the background tasks
///
/// Fails with `Error::Startup` if the initial snapshot cannot be fetched.
pub async fn start<S: MediaServer>(
    server: Arc<S>,
    subscription: ServerEvents,
    events: EventBus,
    settings: MonitorSettings,
) -> Result<MonitorHandle> {
    let register = Arc::new(CurrentTrackRegister::new());
    let fetcher = SnapshotFetcher::new(Arc::clone(&server), settings.paused_identity);
    let dispatcher = Arc::new(ChangeDispatcher::new(
        fetcher,
        Arc::clone(&register),
        events.clone(),
    ));

    dispatcher.initialize().await?;

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let ServerEvents { changes, errors } = subscription;

    let token = shutdown.clone();
    tasks.spawn(async move { dispatcher.run(changes, token).await });

    tasks.spawn(forward_errors(errors, events, shutdown.clone()));

    let keeper = LivenessKeeper::new(server, settings.keepalive_interval, settings.liveness);
    let token = shutdown.clone();
    tasks.spawn(async move { keeper.run(token).await });

    info!("Monitor started");
    Ok(MonitorHandle {
        shutdown,
        tasks,
        register,
    })
}

impl MonitorHandle {
    pub fn register(&self) -> &Arc<CurrentTrackRegister> {
        &self.register
    }

    /// Resolve when the first background task ends
    ///
    /// Tasks only end on their own after a failure (closed subscription,
    /// exhausted liveness retries), so the result is normally an error.
    pub async fn wait(&mut self) -> Result<()> {
        match self.tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(Error::Fatal(format!("monitor task panicked: {}", e))),
            None => Ok(()),
        }
    }

    /// Stop all tasks and cancel the pending half-play timer
    ///
    /// The timer is cleared only after every task has been joined, so an
    /// update still in flight cannot arm a new one behind the clear.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Monitor task ended with error: {}", e),
                Err(e) => warn!("Monitor task panicked: {}", e),
            }
        }
        self.register.clear_pending().await;
        info!("Monitor stopped");
    }
}

/// Log and republish errors from the server subscription
async fn forward_errors(
    mut errors: mpsc::UnboundedReceiver<Error>,
    events: EventBus,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            next = errors.recv() => match next {
                Some(e) => {
                    warn!("Error: {}", e);
                    events.emit_lossy(MonitorEvent::upstream_error(&e));
                }
                // Subscription gone; the dispatcher reports it
                None => {
                    shutdown.cancelled().await;
                    return Ok(());
                }
            },
        }
    }
}
