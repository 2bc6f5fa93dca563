//! Shared fixtures for integration tests.

#![allow(dead_code, missing_docs)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use audit_trail::config::AuditConfig;
use audit_trail::core::{Action, ContentEvent, EventListener, LogStore, StoreError};
use audit_trail::infra::store::{InMemoryObjectStore, ObjectStore};
use audit_trail::runtime::TokioSpawner;

pub const AUDIT_SPACE: &str = "x-audit";

/// Configuration with a short debounce window and fast retries.
pub fn fast_config(cache_dir: &Path, delay_ms: u64) -> AuditConfig {
    audit_trail::util::init_tracing();
    AuditConfig {
        cache_dir: cache_dir.to_path_buf(),
        flush_delay_ms: delay_ms,
        retry_initial_delay_ms: 1,
        retry_max_delay_ms: 5,
        request_timeout_secs: 5,
        ..AuditConfig::default()
    }
}

pub fn event(action: Action, space: &str, content_id: &str) -> ContentEvent {
    ContentEvent::builder(action, space, content_id)
        .account("acme")
        .store_id("0")
        .username("tester")
        .build()
        .expect("valid event")
}

pub fn listener(
    store: Arc<dyn ObjectStore>,
    cfg: AuditConfig,
) -> EventListener<TokioSpawner> {
    let log_store = Arc::new(LogStore::new(store, &cfg));
    EventListener::new(log_store, Arc::new(cfg), TokioSpawner::current())
}

/// Lines of a stored log, header included.
pub fn log_lines(store: &InMemoryObjectStore, name: &str) -> Vec<String> {
    let object = store.object(AUDIT_SPACE, name).expect("log exists");
    String::from_utf8(object.body)
        .expect("utf-8 log")
        .lines()
        .map(String::from)
        .collect()
}

/// Content ids recorded in a stored log, in order.
pub fn logged_content_ids(store: &InMemoryObjectStore, name: &str) -> Vec<String> {
    log_lines(store, name)
        .iter()
        .skip(1)
        .map(|line| {
            ContentEvent::from_tsv_line(line)
                .expect("parsable line")
                .content_id()
                .to_string()
        })
        .collect()
}

/// Store wrapper that slows uploads down and records their overlap.
pub struct TrackingStore {
    pub inner: InMemoryObjectStore,
    put_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TrackingStore {
    pub fn new(put_delay: Duration) -> Self {
        Self {
            inner: InMemoryObjectStore::with_spaces([AUDIT_SPACE]),
            put_delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for TrackingStore {
    async fn spaces(&self) -> Result<Vec<String>, StoreError> {
        self.inner.spaces().await
    }

    async fn space_exists(&self, space_id: &str) -> Result<bool, StoreError> {
        self.inner.space_exists(space_id).await
    }

    async fn create_space(&self, space_id: &str) -> Result<(), StoreError> {
        self.inner.create_space(space_id).await
    }

    async fn list(&self, space_id: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(space_id, prefix).await
    }

    async fn get(&self, space_id: &str, content_id: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(space_id, content_id).await
    }

    async fn put(
        &self,
        space_id: &str,
        content_id: &str,
        body: Vec<u8>,
        mime_type: &str,
        md5: &str,
    ) -> Result<String, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.put_delay).await;
        let result = self.inner.put(space_id, content_id, body, mime_type, md5).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, space_id: &str, content_id: &str) -> Result<(), StoreError> {
        self.inner.delete(space_id, content_id).await
    }
}
