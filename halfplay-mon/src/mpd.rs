//! MPD backend for the MediaServer interface
//!
//! Uses `mpd_client`, which runs MPD's `idle` loop on its own and surfaces
//! subsystem changes as connection events. A forwarding task translates those
//! into the protocol-agnostic `ServerEvents` channels.

use async_trait::async_trait;
use halfplay_common::{Error, PlaybackMode, Result};
use mpd_client::client::{ConnectionEvent, Subsystem};
use mpd_client::responses::PlayState;
use mpd_client::{commands, Client};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::server::{MediaServer, ServerEvents, StatusReport, TrackInfo, PLAYER_SUBSYSTEM};

/// Connected MPD server
pub struct MpdServer {
    client: Client,
    forwarder: JoinHandle<()>,
}

impl MpdServer {
    /// Connect via TCP (`host:port`) or Unix socket (address containing `/`)
    ///
    /// Failure here is a startup error: there is nothing to monitor without
    /// a connection and a subscription.
    pub async fn connect(address: &str) -> Result<(Self, ServerEvents)> {
        info!("Connecting to MPD at {}", address);

        let (client, mut connection_events) = if address.contains('/') {
            #[cfg(unix)]
            {
                let stream = UnixStream::connect(address)
                    .await
                    .map_err(|e| Error::Startup(format!("dial {}: {}", address, e)))?;
                Client::connect(stream)
                    .await
                    .map_err(|e| Error::Startup(format!("handshake {}: {}", address, e)))?
            }
            #[cfg(not(unix))]
            {
                return Err(Error::Startup(
                    "Unix sockets are not supported on this platform".to_string(),
                ));
            }
        } else {
            let stream = TcpStream::connect(address)
                .await
                .map_err(|e| Error::Startup(format!("dial {}: {}", address, e)))?;
            Client::connect(stream)
                .await
                .map_err(|e| Error::Startup(format!("handshake {}: {}", address, e)))?
        };

        let (change_tx, changes) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        let forwarder = tokio::spawn(async move {
            while let Some(event) = connection_events.next().await {
                match event {
                    ConnectionEvent::SubsystemChange(subsystem) => {
                        let name = subsystem_name(&subsystem);
                        debug!("MPD subsystem change: {}", name);
                        if change_tx.send(name).is_err() {
                            break;
                        }
                    }
                    ConnectionEvent::ConnectionClosed(err) => {
                        warn!("MPD connection closed: {}", err);
                        let _ = error_tx.send(Error::upstream(format!("connection closed: {}", err)));
                        break;
                    }
                    #[allow(unreachable_patterns)]
                    _ => {}
                }
            }
            // Dropping change_tx ends the change stream for the dispatcher
            debug!("MPD event forwarder stopped");
        });

        info!("Connected to MPD at {}", address);
        Ok((Self { client, forwarder }, ServerEvents { changes, errors }))
    }

    /// Release the subscription and the query connection
    pub fn close(self) {
        self.forwarder.abort();
        drop(self.client);
        info!("MPD connection closed");
    }
}

fn subsystem_name(subsystem: &Subsystem) -> String {
    match subsystem {
        Subsystem::Player => PLAYER_SUBSYSTEM.to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

fn playback_mode(state: PlayState) -> PlaybackMode {
    match state {
        PlayState::Playing => PlaybackMode::Playing,
        PlayState::Paused => PlaybackMode::Paused,
        PlayState::Stopped => PlaybackMode::Stopped,
    }
}

#[async_trait]
impl MediaServer for MpdServer {
    async fn status(&self) -> Result<StatusReport> {
        let status = self
            .client
            .command(commands::Status)
            .await
            .map_err(|e| Error::upstream(format!("status: {}", e)))?;

        Ok(StatusReport {
            mode: playback_mode(status.state),
            duration: status.duration.map(|d| d.as_secs_f64()),
            elapsed: status.elapsed.map(|d| d.as_secs_f64()),
        })
    }

    async fn current_track(&self) -> Result<Option<TrackInfo>> {
        let current = self
            .client
            .command(commands::CurrentSong)
            .await
            .map_err(|e| Error::upstream(format!("current song: {}", e)))?;

        Ok(current.map(|entry| TrackInfo {
            title: entry.song.title().map(str::to_string),
            artist: entry.song.artists().first().cloned(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .command(commands::Ping)
            .await
            .map_err(|e| Error::upstream(format!("ping: {}", e)))
    }
}
