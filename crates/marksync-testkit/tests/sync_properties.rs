//! Scenario tests for the sync engine's behavioral guarantees.

use std::sync::Arc;

use marksync_core::{now_millis, ChangeRecord, SyncResponse, SyncVersion, WireChange};
use marksync_store::{BookmarkStore, SqliteStore, StoreEvent, SyncStateStore};
use marksync_sync::{
    ChangeSource, ErrorKind, SkipReason, SyncError, SyncEvent, SyncMode, SyncOutcome,
};
use marksync_testkit::fixtures::{count, drain};
use marksync_testkit::{bookmark, remote_change, tombstone, FlakyStore, GatedStore, SyncFixture};

const CHANGED: SyncEvent = SyncEvent::BookmarksChanged {
    source: ChangeSource::Sync,
};

#[tokio::test]
async fn never_synced_device_does_full_sync_without_queueing() {
    let f = SyncFixture::new(0).await;
    f.seed(&[bookmark("https://a.example", "A"), bookmark("https://b.example", "B")])
        .await;
    let c = bookmark("https://c.example", "C");
    f.seed(std::slice::from_ref(&c)).await;
    f.transport.push_response(SyncResponse::new(Vec::new(), 10));

    let report = f.manager.record_bookmark_change(&[c], false).await.unwrap();

    assert_eq!(report.mode, SyncMode::Full);
    let request = f.transport.last_request().unwrap();
    assert!(request.last_sync_version.is_never_synced());
    let mut urls: Vec<_> = request.changes.iter().map(|c| c.url().to_string()).collect();
    urls.sort();
    assert_eq!(
        urls,
        ["https://a.example", "https://b.example", "https://c.example"]
    );
    assert!(f.store.load_pending_changes().await.unwrap().is_empty());
    assert_eq!(f.manager.version(), SyncVersion(10));
}

#[tokio::test]
async fn second_sync_while_in_flight_is_rejected() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(Vec::new(), 6));
    f.transport.pause();

    let first = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.sync_change(false).await })
    };
    f.transport.wait_for_requests(1).await;
    assert!(f.manager.is_syncing());

    let err = f.manager.sync_change(false).await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadySyncing));
    assert_eq!(err.kind(), ErrorKind::ConcurrentSync);
    assert!(matches!(
        f.manager.force_sync().await,
        Err(SyncError::AlreadySyncing)
    ));
    assert!(matches!(
        f.manager.sync_all_local_bookmarks(false).await,
        Err(SyncError::AlreadySyncing)
    ));

    // Nothing moved.
    assert_eq!(f.transport.calls(), 1);
    assert_eq!(f.manager.version(), SyncVersion(5));
    assert_eq!(f.manager.changes().change_count().await.unwrap(), 1);
    assert_eq!(f.manager.changes().overflow_count().await, 0);

    f.transport.resume();
    first.await.unwrap().unwrap();
    assert!(!f.manager.is_syncing());
    assert_eq!(f.manager.version(), SyncVersion(6));
}

#[tokio::test]
async fn latest_change_per_url_is_sent() {
    let f = SyncFixture::new(5).await;
    let changes = f.manager.changes();
    changes
        .add_change(&bookmark("https://a.example", "first"), false)
        .await
        .unwrap();
    changes
        .add_change(&bookmark("https://a.example", "second"), true)
        .await
        .unwrap();
    let latest = changes.pending_changes().await.unwrap()["https://a.example"]
        .change
        .clone();

    f.manager.sync_change(false).await.unwrap();

    let request = f.transport.last_request().unwrap();
    assert_eq!(request.changes, vec![latest]);
    assert_eq!(request.changes[0].content.title, "second");
    assert!(request.changes[0].is_deleted);
}

async fn edit_during_round_trip(fail: bool) -> SyncFixture {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    if fail {
        f.transport
            .push_error(SyncError::Server { status: 503, message: "maintenance".into() });
    } else {
        f.transport.push_response(SyncResponse::new(Vec::new(), 6));
    }
    f.transport.pause();

    let task = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.sync_change(false).await })
    };
    f.transport.wait_for_requests(1).await;

    f.manager
        .changes()
        .add_change(&bookmark("https://b.example", "B"), false)
        .await
        .unwrap();
    // The snapshot being sent is untouched.
    let pending = f.manager.changes().pending_changes().await.unwrap();
    assert!(!pending.contains_key("https://b.example"));

    f.transport.resume();
    assert_eq!(task.await.unwrap().is_err(), fail);
    f
}

#[tokio::test]
async fn edit_during_successful_round_trip_becomes_durable() {
    let f = edit_during_round_trip(false).await;

    let pending = f.store.load_pending_changes().await.unwrap();
    assert_eq!(pending.keys().collect::<Vec<_>>(), ["https://b.example"]);
    assert_eq!(f.manager.changes().overflow_count().await, 0);
}

#[tokio::test]
async fn edit_during_failed_round_trip_becomes_durable() {
    let f = edit_during_round_trip(true).await;

    let pending = f.store.load_pending_changes().await.unwrap();
    assert_eq!(
        pending.keys().collect::<Vec<_>>(),
        ["https://a.example", "https://b.example"]
    );
    assert_eq!(f.manager.version(), SyncVersion(5));
}

#[tokio::test]
async fn server_version_regression_is_ignored() {
    let f = SyncFixture::new(100).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(Vec::new(), 60));

    let report = f.manager.sync_change(false).await.unwrap();

    assert_eq!(report.version, SyncVersion(100));
    assert_eq!(f.manager.version(), SyncVersion(100));
    assert_eq!(f.store.load_sync_version().await.unwrap(), SyncVersion(100));
    // The exchange itself succeeded, so the queue is drained.
    assert!(f.store.load_pending_changes().await.unwrap().is_empty());
}

#[tokio::test]
async fn zero_server_version_becomes_wall_clock() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(Vec::new(), 0));
    let before = now_millis() as u64;

    f.manager.sync_change(false).await.unwrap();

    let version = f.store.load_sync_version().await.unwrap();
    assert!(version.get() >= before);
    assert_eq!(f.manager.version(), version);
}

#[tokio::test]
async fn remote_content_keeps_local_usage() {
    let f = SyncFixture::new(5).await;
    let mut local = bookmark("https://a.example", "Local title").with_tags(["local"]);
    local.use_count = 7;
    local.last_used = Some(1_700_000_123_000);
    f.seed(&[local]).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://z.example", "Z"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(
        vec![remote_change("https://a.example", "Remote title", 90)],
        91,
    ));

    f.manager.sync_change(false).await.unwrap();

    let merged = f.store.get("https://a.example").await.unwrap().unwrap();
    assert_eq!(merged.use_count, 7);
    assert_eq!(merged.last_used, Some(1_700_000_123_000));
    assert_eq!(merged.title, "Remote title");
    assert_eq!(merged.tags, vec!["remote".to_string()]);
    assert_eq!(merged.excerpt, "from server");
}

#[tokio::test]
async fn tombstone_for_unknown_bookmark_is_noop() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(
        vec![tombstone("https://never-seen.example", 50)],
        6,
    ));
    let mut sync_events = f.manager.subscribe();
    let mut store_events = f.store.subscribe();

    let report = f.manager.sync_change(false).await.unwrap();

    assert_eq!(report.applied.ignored, 1);
    assert!(!report.applied.changed());
    assert_eq!(count(&drain(&mut sync_events), &CHANGED), 0);
    assert!(drain(&mut store_events)
        .iter()
        .all(|e| !matches!(e, StoreEvent::Deleted { .. })));
}

#[tokio::test]
async fn end_to_end_incremental_round_trip() {
    let f = SyncFixture::new(42).await;
    f.seed(&[bookmark("https://b.example", "B")]).await;
    let a = bookmark("https://a.example", "A");
    f.manager
        .changes()
        .enqueue(ChangeRecord {
            timestamp: 100,
            change: WireChange::from_bookmark(&a, false, 100),
        })
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(
        vec![tombstone("https://b.example", 50)],
        60,
    ));
    let mut events = f.manager.subscribe();

    let report = f.manager.sync_change(false).await.unwrap();

    let request = f.transport.last_request().unwrap();
    assert_eq!(request.last_sync_version, SyncVersion(42));
    assert_eq!(request.changes.len(), 1);
    assert_eq!(request.changes[0].url(), "https://a.example");
    assert_eq!(request.changes[0].version, 100);
    assert!(!request.changes[0].is_deleted);

    assert!(f.store.get("https://b.example").await.unwrap().is_none());
    assert_eq!(f.store.load_sync_version().await.unwrap(), SyncVersion(60));
    assert!(f.store.load_pending_changes().await.unwrap().is_empty());
    assert_eq!(report.outcome, SyncOutcome::Completed);

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![SyncEvent::SyncStarted, CHANGED, SyncEvent::SyncFinished]
    );
}

#[tokio::test]
async fn end_to_end_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marksync.db");

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let f = SyncFixture::with_store(store, 42).await;
        f.seed(&[bookmark("https://b.example", "B")]).await;
        f.manager
            .changes()
            .add_change(&bookmark("https://a.example", "A"), false)
            .await
            .unwrap();
        f.transport.push_response(SyncResponse::new(
            vec![
                tombstone("https://b.example", 50),
                remote_change("https://c.example", "C", 55),
            ],
            60,
        ));

        f.manager.sync_change(false).await.unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.load_sync_version().await.unwrap(), SyncVersion(60));
    assert!(store.load_pending_changes().await.unwrap().is_empty());
    let all = store.get_all().await.unwrap();
    assert_eq!(
        all.keys().collect::<Vec<_>>(),
        ["https://c.example"]
    );
}

#[tokio::test]
async fn one_bad_record_does_not_abort_the_batch() {
    let store = Arc::new(FlakyStore::new());
    store.fail_writes_for("https://bad.example");
    let f = SyncFixture::with_store(store, 5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(
        vec![
            remote_change("https://bad.example", "Bad", 10),
            remote_change("https://good.example", "Good", 11),
        ],
        12,
    ));

    let report = f.manager.sync_change(false).await.unwrap();

    assert_eq!(report.applied.failed, 1);
    assert_eq!(report.applied.upserted, 1);
    assert!(f.store.get("https://good.example").await.unwrap().is_some());
    assert_eq!(f.manager.version(), SyncVersion(12));
}

#[tokio::test]
async fn offline_background_sync_is_silent_and_keeps_queue() {
    let f = SyncFixture::new(5).await;
    f.network.set_online(false);
    let mut events = f.manager.subscribe();

    let report = f
        .manager
        .record_bookmark_change(&[bookmark("https://a.example", "A")], false)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        SyncOutcome::Skipped(SkipReason::NotEligible(_))
    ));
    assert_eq!(f.manager.changes().change_count().await.unwrap(), 1);
    // Skipped quietly: the finish is announced, the start never was.
    assert_eq!(drain(&mut events), vec![SyncEvent::SyncFinished]);
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn rejected_credential_keeps_queue_and_version() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_error(SyncError::Unauthorized);

    let err = f.manager.force_sync().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(f.manager.version(), SyncVersion(5));
    assert_eq!(f.manager.changes().change_count().await.unwrap(), 1);
}

#[tokio::test]
async fn change_on_never_synced_device_during_sync_is_queued() {
    let f = SyncFixture::new(0).await;
    f.transport.push_response(SyncResponse::new(Vec::new(), 10));
    f.transport.pause();

    let first = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.force_sync().await })
    };
    f.transport.wait_for_requests(1).await;

    let late = bookmark("https://late.example", "Late");
    f.seed(std::slice::from_ref(&late)).await;
    let err = f
        .manager
        .record_bookmark_change(&[late], false)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadySyncing));

    f.transport.resume();
    first.await.unwrap().unwrap();

    // The full sync that was in flight did not carry it; the queue does.
    assert_eq!(f.manager.version(), SyncVersion(10));
    let pending = f.store.load_pending_changes().await.unwrap();
    assert!(pending.contains_key("https://late.example"));
}

#[tokio::test]
async fn cancelled_round_trip_does_not_wedge_the_manager() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.pause();

    let task = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.sync_change(false).await })
    };
    f.transport.wait_for_requests(1).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!f.manager.is_syncing());

    // Still diverting until the next round trip merges.
    f.manager
        .changes()
        .add_change(&bookmark("https://b.example", "B"), false)
        .await
        .unwrap();
    f.transport.resume();
    f.transport.push_response(SyncResponse::new(Vec::new(), 7));

    f.manager.sync_change(false).await.unwrap();

    let pending = f.store.load_pending_changes().await.unwrap();
    assert_eq!(pending.keys().collect::<Vec<_>>(), ["https://b.example"]);
    assert_eq!(f.manager.version(), SyncVersion(7));
}

#[tokio::test]
async fn edit_after_cancelled_round_trip_is_durable_while_offline() {
    let f = SyncFixture::new(5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.pause();

    let task = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.sync_change(false).await })
    };
    f.transport.wait_for_requests(1).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    f.network.set_online(false);
    let report = f
        .manager
        .record_bookmark_change(&[bookmark("https://b.example", "B")], false)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        SyncOutcome::Skipped(SkipReason::NotEligible(_))
    ));
    assert!(!f.manager.changes().is_diverting().await);
    assert_eq!(f.manager.changes().overflow_count().await, 0);
    let pending = f.store.load_pending_changes().await.unwrap();
    assert_eq!(
        pending.keys().collect::<Vec<_>>(),
        ["https://a.example", "https://b.example"]
    );
}

#[tokio::test]
async fn cleanup_while_applying_response_is_not_undone() {
    let store = Arc::new(GatedStore::new());
    let f = SyncFixture::with_store(store.clone(), 5).await;
    f.manager
        .changes()
        .add_change(&bookmark("https://a.example", "A"), false)
        .await
        .unwrap();
    f.transport.push_response(SyncResponse::new(
        vec![remote_change("https://b.example", "B", 90)],
        99,
    ));
    store.close();

    let sync = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.sync_change(false).await })
    };
    // The round trip is now applying the server's change.
    store.wait_for_parked(1).await;

    let cleanup = {
        let manager = f.manager.clone();
        tokio::spawn(async move { manager.cleanup().await })
    };
    tokio::task::yield_now().await;
    assert!(!cleanup.is_finished());

    store.open();
    sync.await.unwrap().unwrap();
    cleanup.await.unwrap().unwrap();

    assert!(f.manager.version().is_never_synced());
    assert!(store.load_sync_version().await.unwrap().is_never_synced());
    assert!(store.load_pending_changes().await.unwrap().is_empty());
}
