//! End-to-end monitor tests against the scripted server

mod helpers;

use halfplay_common::{Error, EventBus, MonitorEvent};
use halfplay_mon::liveness::LivenessPolicy;
use halfplay_mon::monitor::{self, MonitorSettings};
use helpers::scripted_server::subscription;
use helpers::{drain, half_played, next_event, track_changes, wait_until, ScriptedServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn settings() -> MonitorSettings {
    MonitorSettings {
        keepalive_interval: Duration::from_secs(30),
        liveness: LivenessPolicy::Abort,
        ..MonitorSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_monitor_follows_changes_and_reports_half_played() {
    let server = Arc::new(ScriptedServer::playing("First", 60.0));
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let (sender, subscription) = subscription();

    let handle = monitor::start(Arc::clone(&server), subscription, events, settings())
        .await
        .unwrap();
    assert!(matches!(next_event(&mut rx).await, MonitorEvent::TrackChanged { .. }));

    server.set_playing("Second", 120.0, 0.0);
    sender.changes.send("player".to_string()).unwrap();
    match next_event(&mut rx).await {
        MonitorEvent::TrackChanged { track, .. } => assert_eq!(track, "Second by Artist"),
        other => panic!("Expected TrackChanged, got {:?}", other),
    }

    server.set_elapsed(61.0);
    match next_event(&mut rx).await {
        MonitorEvent::HalfPlayed { track, .. } => assert_eq!(track, "Second by Artist"),
        other => panic!("Expected HalfPlayed, got {:?}", other),
    }

    assert_eq!(
        handle.register().current().await.as_deref(),
        Some("Second by Artist")
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscription_errors_are_republished() {
    let server = Arc::new(ScriptedServer::new());
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let (sender, subscription) = subscription();

    let handle = monitor::start(Arc::clone(&server), subscription, events, settings())
        .await
        .unwrap();
    next_event(&mut rx).await;

    sender
        .errors
        .send(Error::Upstream("idle: protocol error".to_string()))
        .unwrap();

    match next_event(&mut rx).await {
        MonitorEvent::UpstreamError { message, .. } => {
            assert!(message.contains("idle: protocol error"))
        }
        other => panic!("Expected UpstreamError, got {:?}", other),
    }
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_fails_without_initial_status() {
    let server = Arc::new(ScriptedServer::new());
    server.fail_next_status(1);
    let (_sender, subscription) = subscription();

    let result = monitor::start(server, subscription, EventBus::new(8), settings()).await;

    assert!(matches!(result, Err(Error::Startup(_))));
}

#[tokio::test(start_paused = true)]
async fn test_closed_subscription_ends_monitor() {
    let server = Arc::new(ScriptedServer::new());
    let (sender, subscription) = subscription();

    let mut handle = monitor::start(Arc::clone(&server), subscription, EventBus::new(8), settings())
        .await
        .unwrap();
    drop(sender);

    assert!(matches!(handle.wait().await, Err(Error::Upstream(_))));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ping_failure_ends_monitor() {
    let server = Arc::new(ScriptedServer::new());
    let (_sender, subscription) = subscription();

    let mut handle = monitor::start(Arc::clone(&server), subscription, EventBus::new(8), settings())
        .await
        .unwrap();

    // First ping at t=0 succeeds, the next one fails
    wait_until(|| server.ping_calls() >= 1).await;
    server.fail_next_pings(1);

    assert!(matches!(handle.wait().await, Err(Error::Fatal(_))));
    assert_eq!(server.ping_calls(), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_timer() {
    let server = Arc::new(ScriptedServer::playing("Interrupted", 100.0));
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let (_sender, subscription) = subscription();

    let handle = monitor::start(Arc::clone(&server), subscription, events.clone(), settings())
        .await
        .unwrap();
    let register = Arc::clone(handle.register());
    handle.shutdown().await;

    assert!(register.pending_track().await.is_none());

    server.set_elapsed(90.0);
    sleep(Duration::from_secs(120)).await;
    let events = drain(&mut rx);
    assert_eq!(track_changes(&events), vec!["Interrupted by Artist"]);
    assert!(half_played(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_fetch_leaves_no_live_timer() {
    let server = Arc::new(ScriptedServer::playing("A", 100.0));
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let (sender, subscription) = subscription();

    let handle = monitor::start(Arc::clone(&server), subscription, events.clone(), settings())
        .await
        .unwrap();
    let register = Arc::clone(handle.register());
    let track_calls = server.track_calls();

    server.set_playing("B", 100.0, 0.0);
    server.delay_next_track(Duration::from_secs(2));
    sender.changes.send("player".to_string()).unwrap();
    wait_until(|| server.track_calls() > track_calls).await;

    handle.shutdown().await;

    assert_eq!(register.current().await.as_deref(), Some("B by Artist"));
    assert!(register.pending_track().await.is_none());

    server.set_elapsed(90.0);
    sleep(Duration::from_secs(120)).await;
    let events = drain(&mut rx);
    assert_eq!(track_changes(&events), vec!["A by Artist", "B by Artist"]);
    assert!(half_played(&events).is_empty());
}
