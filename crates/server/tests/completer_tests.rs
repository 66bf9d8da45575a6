//! Reconciliation tick behavior against in-memory collaborators.

mod common;

use common::{CountingTrackerSource, FailingTrackerSource, FlakyUploadStore, Harness};
use sealer_core::{Clock, SessionId, SessionKind};
use sealer_server::CompleterError;
use sealer_storage::UploadStore;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_abandoned_upload_is_completed_once() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let completer = h.builder().build().unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.uploads_seen, 1);
    assert_eq!(stats.completed, 1);
    assert!(h.is_completed(&upload).await);

    // Nothing left to do on the next pass.
    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.uploads_seen, 0);
    assert_eq!(stats.completed, 0);

    let emissions = completer.emissions().wait_idle().await;
    assert_eq!(emissions.scheduled, 1);
    assert_eq!(emissions.emitted, 1);
}

#[tokio::test]
async fn test_active_tracker_keeps_upload_open() {
    let h = Harness::new();
    let session_id = SessionId::new();
    h.track(session_id, SessionKind::Ssh, time::Duration::hours(1))
        .await;
    let upload = h.upload(session_id).await;
    let completer = h.builder().build().unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.completed, 0);
    assert!(!h.is_completed(&upload).await);
    assert_eq!(completer.emissions().stats().scheduled, 0);
}

#[tokio::test]
async fn test_active_session_does_not_protect_other_sessions() {
    let h = Harness::new();
    let live = SessionId::new();
    h.track(live, SessionKind::Kubernetes, time::Duration::hours(1))
        .await;
    let kept = h.upload(live).await;
    let abandoned = h.upload(SessionId::new()).await;
    let completer = h.builder().build().unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.completed, 1);
    assert!(!h.is_completed(&kept).await);
    assert!(h.is_completed(&abandoned).await);
}

#[tokio::test]
async fn test_missing_tracker_waits_for_grace_period() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let completer = h
        .builder()
        .grace_period(time::Duration::hours(2))
        .build()
        .unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.deferred, 1);
    assert!(!h.is_completed(&upload).await);

    h.clock
        .advance(time::Duration::hours(2) - time::Duration::seconds(1));
    completer.check_uploads().await.unwrap();
    assert!(!h.is_completed(&upload).await);

    h.clock.advance(time::Duration::seconds(1));
    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert!(h.is_completed(&upload).await);
}

#[tokio::test]
async fn test_denied_snapshot_is_treated_as_no_active_sessions() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let completer = h
        .builder()
        .tracker_source(Arc::new(FailingTrackerSource::denying()))
        .grace_period(time::Duration::hours(1))
        .build()
        .unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.deferred, 1);

    h.clock.advance(time::Duration::hours(1));
    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert!(h.is_completed(&upload).await);
}

#[tokio::test]
async fn test_failed_listing_aborts_tick() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let store = Arc::new(FlakyUploadStore::new(h.store.clone()));
    store.set_fail_listing(true);
    let completer = h.builder().upload_store(store.clone()).build().unwrap();

    let err = completer.check_uploads().await.unwrap_err();
    assert!(matches!(err, CompleterError::Storage(_)));
    assert!(!h.is_completed(&upload).await);

    store.set_fail_listing(false);
    assert_eq!(completer.check_uploads().await.unwrap().completed, 1);
}

#[tokio::test]
async fn test_failed_snapshot_aborts_tick() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let completer = h
        .builder()
        .tracker_source(Arc::new(FailingTrackerSource::unavailable()))
        .build()
        .unwrap();

    let err = completer.check_uploads().await.unwrap_err();
    assert!(matches!(err, CompleterError::Registry(_)));
    assert!(!h.is_completed(&upload).await);
    assert_eq!(completer.emissions().stats().scheduled, 0);
}

#[tokio::test]
async fn test_completion_failure_does_not_stop_batch() {
    let h = Harness::new();
    let failing = h.upload(SessionId::new()).await;
    let healthy = h.upload(SessionId::new()).await;
    let store = Arc::new(FlakyUploadStore::new(h.store.clone()));
    store.fail_completion_of(failing.id);
    let completer = h.builder().upload_store(store.clone()).build().unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.completed, 1);
    assert!(!h.is_completed(&failing).await);
    assert!(h.is_completed(&healthy).await);

    // Only the completed upload gets emissions.
    let emissions = completer.emissions().wait_idle().await;
    assert_eq!(emissions.scheduled, 1);

    // The failed one is still listed and retried next tick.
    let listed = store.list_uploads().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, failing.id);
}

#[tokio::test]
async fn test_tracker_snapshot_fetched_once_per_tick() {
    let h = Harness::new();
    for _ in 0..3 {
        h.upload(SessionId::new()).await;
    }
    let trackers = Arc::new(CountingTrackerSource::new(h.trackers.clone()));
    let completer = h.builder().tracker_source(trackers.clone()).build().unwrap();

    let stats = completer.check_uploads().await.unwrap();
    assert_eq!(stats.completed, 3);
    assert_eq!(trackers.snapshots.load(Ordering::SeqCst), 1);
    assert_eq!(trackers.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_part_upload_is_completed_without_emission() {
    let h = Harness::new();
    let session_id = SessionId::new();
    h.record(common::session_start(session_id, h.clock.now()))
        .await;
    let upload = h.store.create_upload(session_id).await.unwrap();
    let completer = h.builder().build().unwrap();

    assert_eq!(completer.check_uploads().await.unwrap().completed, 1);
    assert!(h.is_completed(&upload).await);

    let emissions = completer.emissions().wait_idle().await;
    assert_eq!(emissions.scheduled, 0);
    // Only the start recorded by the node itself.
    assert_eq!(h.audit.events().await.len(), 1);
}

#[tokio::test]
async fn test_emissions_leave_registry_once_finished() {
    let h = Harness::new();
    for _ in 0..50 {
        h.upload(SessionId::new()).await;
    }
    let completer = h.builder().build().unwrap();

    assert_eq!(completer.check_uploads().await.unwrap().completed, 50);
    let stats = completer.emissions().wait_idle().await;
    assert_eq!(stats.emitted, 50);
    assert_eq!(completer.emissions().in_flight().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_loop_completes_uploads_periodically() {
    let h = Harness::new();
    let upload = h.upload(SessionId::new()).await;
    let completer = h
        .builder()
        .check_interval(Duration::from_secs(10))
        .build()
        .unwrap();

    // First tick is one interval after start.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!h.is_completed(&upload).await);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(h.is_completed(&upload).await);

    // Uploads arriving later are picked up by a following tick.
    let later = h.upload(SessionId::new()).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.is_completed(&later).await);

    completer.stop().await;
    assert!(!completer.is_running());
    assert_eq!(completer.emissions().wait_idle().await.emitted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_leaves_scheduled_emissions_running() {
    let h = Harness::new();
    let session_id = SessionId::new();
    h.record(common::session_start(session_id, h.clock.now()))
        .await;
    h.upload(session_id).await;
    let completer = h
        .builder()
        .emission_delay(Duration::from_secs(120))
        .build()
        .unwrap();

    completer.check_uploads().await.unwrap();
    completer.stop().await;
    assert_eq!(completer.emissions().in_flight().await, 1);

    let stats = completer.emissions().wait_idle().await;
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.cancelled, 0);
    assert_eq!(h.audit.events().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_abort_emissions_cancels_pending_work() {
    let h = Harness::new();
    h.upload(SessionId::new()).await;
    let completer = h
        .builder()
        .emission_delay(Duration::from_secs(120))
        .build()
        .unwrap();

    completer.check_uploads().await.unwrap();
    completer.emissions().abort_emissions();

    let stats = completer.emissions().wait_idle().await;
    assert_eq!(stats.cancelled, 1);
    assert!(h.audit.events().await.is_empty());
}
