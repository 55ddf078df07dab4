//! halfplay-mon - Main entry point
//!
//! Connects to MPD, follows player changes and logs every track change and
//! every track that played past its half-way point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use halfplay_common::config::{resolve_address, PausedIdentity, TomlConfig};
use halfplay_common::{EventBus, MonitorEvent};
use halfplay_mon::monitor::{self, MonitorSettings};
use halfplay_mon::mpd::MpdServer;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for halfplay-mon
#[derive(Parser, Debug)]
#[command(name = "halfplay-mon")]
#[command(about = "Reports MPD tracks that played past their half-way point")]
#[command(version)]
struct Args {
    /// MPD address (host:port or Unix socket path)
    #[arg(short, long)]
    address: Option<String>,

    /// Configuration file (default: <config dir>/halfplay/config.toml)
    #[arg(short, long, env = "HALFPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Report paused playback as "paused" instead of the loaded track
    #[arg(long)]
    paused_placeholder: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.paused_placeholder {
        config.monitor.paused_identity = PausedIdentity::Placeholder;
    }

    // Initialize tracing
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("halfplay_mon={level},halfplay_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let address = resolve_address(args.address.as_deref(), &config);
    info!("Starting halfplay-mon {}", env!("CARGO_PKG_VERSION"));

    let (server, subscription) = MpdServer::connect(&address)
        .await
        .context("Failed to connect to MPD")?;
    let server = Arc::new(server);

    let events = EventBus::new(config.monitor.event_capacity);
    let logger = tokio::spawn(log_events(events.subscribe()));

    let mut handle = monitor::start(
        Arc::clone(&server),
        subscription,
        events,
        MonitorSettings::from(&config.monitor),
    )
    .await
    .context("Failed to start monitor")?;

    let outcome = tokio::select! {
        _ = shutdown_signal() => Ok(()),
        result = handle.wait() => result,
    };

    handle.shutdown().await;
    logger.abort();

    match Arc::try_unwrap(server) {
        Ok(server) => server.close(),
        Err(server) => {
            warn!("MPD connection still referenced at exit, closing on drop");
            drop(server);
        }
    }

    if let Err(e) = outcome {
        error!("Monitor failed: {}", e);
        return Err(e).context("Monitor terminated");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log events produced by the tracker
async fn log_events(mut rx: broadcast::Receiver<MonitorEvent>) {
    loop {
        match rx.recv().await {
            Ok(MonitorEvent::TrackChanged { track, .. }) => info!("Track changed: {}", track),
            Ok(MonitorEvent::HalfPlayed { track, .. }) => info!("Played over half: {}", track),
            Ok(MonitorEvent::UpstreamError { message, .. }) => warn!("Error: {}", message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event logger lagged, skipped {} events", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
