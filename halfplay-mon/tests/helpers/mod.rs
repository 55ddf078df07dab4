//! Test helper modules for halfplay-mon integration tests
//!
//! - ScriptedServer: in-memory MediaServer with scriptable state and failures
//! - Event helpers: collect MonitorEvents from an EventBus receiver

#![allow(dead_code)]

pub mod scripted_server;

pub use scripted_server::ScriptedServer;

use halfplay_common::MonitorEvent;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wait for the next event (time auto-advances under a paused clock)
pub async fn next_event(rx: &mut broadcast::Receiver<MonitorEvent>) -> MonitorEvent {
    tokio::time::timeout(Duration::from_secs(3600), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

/// Everything currently buffered, without waiting
pub fn drain(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Tracks of all HalfPlayed events in `events`
pub fn half_played(events: &[MonitorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::HalfPlayed { track, .. } => Some(track.clone()),
            _ => None,
        })
        .collect()
}

/// Tracks of all TrackChanged events in `events`
pub fn track_changes(events: &[MonitorEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            MonitorEvent::TrackChanged { track, .. } => Some(track.clone()),
            _ => None,
        })
        .collect()
}

/// Yield to spawned tasks until `condition` holds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
