//! Integration tests for the auditor lifecycle and the hosting API surface.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use audit_trail::builders::start_auditor;
use audit_trail::core::{Action, AuditError, Auditor, StoreError};
use audit_trail::infra::store::{
    FileObjectStore, InMemoryObjectStore, ObjectStore, StaticConnector, StoreConnector,
};
use audit_trail::runtime::{api, health, list_audit_logs, TokioSpawner};
use support::{event, fast_config, logged_content_ids, TrackingStore, AUDIT_SPACE};
use tempfile::tempdir;

struct UnreachableStore;

#[async_trait]
impl StoreConnector for UnreachableStore {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Err(StoreError::Transient("connection refused".into()))
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn operations_before_initialize_fail() {
    let cache = tempdir().unwrap();
    let auditor = Auditor::new(fast_config(cache.path(), 10), TokioSpawner::current());

    assert!(!auditor.is_initialized());
    assert!(matches!(
        auditor.on_content_event(event(Action::CreateContent, "S1", "A")),
        Err(AuditError::Uninitialized)
    ));
    assert!(matches!(
        auditor.get_audit_logs("S1").await,
        Err(AuditError::Uninitialized)
    ));
    assert!(matches!(
        auditor.remove_log("audit/S1-x.tsv").await,
        Err(AuditError::Uninitialized)
    ));
    assert!(matches!(
        auditor.create_initial_audit_logs().await,
        Err(AuditError::Uninitialized)
    ));
    assert!(matches!(
        auditor.set_write_paused("S1", true),
        Err(AuditError::Uninitialized)
    ));
    assert!(matches!(auditor.stop(), Err(AuditError::Uninitialized)));
    assert!(matches!(
        auditor.shutdown(true).await,
        Err(AuditError::Uninitialized)
    ));

    let h = health(&auditor);
    assert!(!h.ok);
    assert!(!h.initialized);
}

#[tokio::test]
async fn unreachable_store_fails_initialization() {
    let cache = tempdir().unwrap();
    let auditor = Auditor::new(fast_config(cache.path(), 10), TokioSpawner::current());

    let err = auditor.initialize(&UnreachableStore).await.unwrap_err();
    assert!(matches!(err, AuditError::Initialization(_)));
    assert!(!auditor.is_initialized());
}

#[tokio::test]
async fn initial_audit_logs_prepare_audit_space() {
    let cache = tempdir().unwrap();
    let store = Arc::new(InMemoryObjectStore::with_spaces([
        "photos",
        "docs",
        "x-service-out",
    ]));
    let connector = StaticConnector(store.clone());
    let auditor = Auditor::new(fast_config(cache.path(), 10), TokioSpawner::current());
    auditor.initialize(&connector).await.unwrap();

    let inspected = auditor.create_initial_audit_logs().await.unwrap();
    assert_eq!(inspected, 2);
    assert!(store.space_exists(AUDIT_SPACE).await.unwrap());

    // Running it again is harmless.
    assert_eq!(auditor.create_initial_audit_logs().await.unwrap(), 2);
}

#[tokio::test]
async fn space_without_history_is_not_found() {
    let cache = tempdir().unwrap();
    let connector = StaticConnector::new(InMemoryObjectStore::with_spaces([AUDIT_SPACE]));
    let auditor = start_auditor(
        fast_config(cache.path(), 10),
        TokioSpawner::current(),
        &connector,
    )
    .await
    .unwrap();

    assert!(matches!(
        auditor.get_audit_logs("never-used").await,
        Err(AuditError::NotFound(_))
    ));
    assert!(matches!(
        list_audit_logs(&auditor, "never-used").await,
        Err(AuditError::NotFound(_))
    ));
}

// ============================================================================
// END TO END
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_land_in_filesystem_store() {
    let cache = tempdir().unwrap();
    let root = tempdir().unwrap();
    let connector = StaticConnector::new(FileObjectStore::new(root.path()).unwrap());
    let auditor = start_auditor(
        fast_config(cache.path(), 50),
        TokioSpawner::current(),
        &connector,
    )
    .await
    .unwrap();

    auditor
        .on_content_event(event(Action::CreateContent, "photos", "beach.jpg"))
        .unwrap();
    auditor
        .on_content_event(
            audit_trail::core::ContentEvent::builder(Action::CopyContent, "photos", "copy.jpg")
                .source("photos", "beach.jpg")
                .property("tags", "sea\tsun")
                .build()
                .unwrap(),
        )
        .unwrap();

    let status = api::status(&auditor).unwrap();
    assert_eq!(status.pending_events, 2);
    assert!(health(&auditor).ok);

    let summary = auditor.shutdown(true).await.unwrap();
    assert_eq!(summary.persisted, 2);
    assert!(!health(&auditor).ok);
    assert!(health(&auditor).stopped);

    let listing = list_audit_logs(&auditor, "photos").await.unwrap();
    assert_eq!(listing.space_id, "photos");
    assert_eq!(listing.logs.len(), 1);
    assert_eq!(auditor.get_audit_logs("photos").await.unwrap(), listing.logs[0]);

    let on_disk = std::fs::read_to_string(root.path().join(AUDIT_SPACE).join(&listing.logs[0]))
        .unwrap();
    let lines: Vec<&str> = on_disk.lines().collect();
    assert_eq!(lines.len(), 3);
    let copy = audit_trail::core::ContentEvent::from_tsv_line(lines[2]).unwrap();
    assert_eq!(copy.action(), Action::CopyContent);
    assert_eq!(copy.source_content_id(), Some("beach.jpg"));
    assert_eq!(copy.properties().get("tags").map(String::as_str), Some("sea\tsun"));

    auditor.remove_log(&listing.logs[0]).await.unwrap();
    assert!(matches!(
        auditor.get_audit_logs("photos").await,
        Err(AuditError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reinitialize_drains_previous_pipeline() {
    let cache = tempdir().unwrap();
    let store = Arc::new(InMemoryObjectStore::with_spaces([AUDIT_SPACE]));
    let connector = StaticConnector(store.clone());
    let auditor = Auditor::new(fast_config(cache.path(), 60_000), TokioSpawner::current());
    auditor.initialize(&connector).await.unwrap();

    auditor
        .on_content_event(event(Action::CreateContent, "S1", "A"))
        .unwrap();
    auditor.initialize(&connector).await.unwrap();

    assert_eq!(auditor.get_audit_logs("S1").await.unwrap().lines().count(), 1);
    assert_eq!(auditor.status().unwrap().pending_events, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reinitialize_during_slow_upload_keeps_one_writer() {
    let cache = tempdir().unwrap();
    let store = Arc::new(TrackingStore::new(Duration::from_millis(400)));
    let auditor = Arc::new(Auditor::new(
        fast_config(cache.path(), 50),
        TokioSpawner::current(),
    ));
    auditor
        .initialize(&StaticConnector(store.clone()))
        .await
        .unwrap();

    auditor
        .on_content_event(event(Action::CreateContent, "S1", "A"))
        .unwrap();
    let reinit = tokio::spawn({
        let auditor = Arc::clone(&auditor);
        let connector = StaticConnector(store.clone());
        async move { auditor.initialize(&connector).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    auditor
        .on_content_event(event(Action::CreateContent, "S1", "B"))
        .unwrap();

    reinit.await.unwrap().unwrap();
    let summary = auditor.shutdown(true).await.unwrap();
    assert_eq!(summary.persisted, 1);
    assert_eq!(store.max_in_flight(), 1);

    let names = auditor.get_audit_logs("S1").await.unwrap();
    let names: Vec<&str> = names.lines().collect();
    assert_eq!(names.len(), 1);
    assert_eq!(logged_content_ids(&store.inner, names[0]), ["A", "B"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reinitialize_keeps_write_pauses() {
    let cache = tempdir().unwrap();
    let store = Arc::new(InMemoryObjectStore::with_spaces([AUDIT_SPACE]));
    let connector = StaticConnector(store.clone());
    let auditor = start_auditor(
        fast_config(cache.path(), 20),
        TokioSpawner::current(),
        &connector,
    )
    .await
    .unwrap();

    auditor.set_write_paused("S1", true).unwrap();
    auditor.initialize(&connector).await.unwrap();
    assert_eq!(auditor.status().unwrap().paused_spaces, ["S1"]);

    auditor
        .on_content_event(event(Action::CreateContent, "S1", "A"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(auditor.status().unwrap().pending_events, 1);

    auditor.set_write_paused("S1", false).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(auditor.status().unwrap().pending_events, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paused_writes_through_auditor() {
    let cache = tempdir().unwrap();
    let store = Arc::new(InMemoryObjectStore::with_spaces([AUDIT_SPACE]));
    let connector = StaticConnector(store.clone());
    let auditor = start_auditor(
        fast_config(cache.path(), 20),
        TokioSpawner::current(),
        &connector,
    )
    .await
    .unwrap();

    auditor.set_write_paused("S1", true).unwrap();
    auditor
        .on_content_event(event(Action::CreateContent, "S1", "A"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(auditor.status().unwrap().pending_events, 1);

    auditor.set_write_paused("S1", false).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(auditor.status().unwrap().pending_events, 0);
    assert!(auditor.get_audit_logs("S1").await.is_ok());
}
