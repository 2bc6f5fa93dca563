//! Remote object store contract and adapters.
//!
//! The audit trail persists its logs into the same object store it audits. The
//! engine only needs the narrow surface of [`ObjectStore`]; vendor adapters
//! live outside this crate and implement it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::StoreError;

pub mod fs;
pub mod memory;

pub use fs::FileObjectStore;
pub use memory::{InMemoryObjectStore, StoreOp, StoredObject};

/// Narrow object store surface used by the audit trail.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Ids of all spaces in the store.
    async fn spaces(&self) -> Result<Vec<String>, StoreError>;

    /// Whether `space_id` exists.
    async fn space_exists(&self, space_id: &str) -> Result<bool, StoreError>;

    /// Create `space_id`; creating an existing space succeeds.
    async fn create_space(&self, space_id: &str) -> Result<(), StoreError>;

    /// Content ids in `space_id` starting with `prefix`.
    async fn list(&self, space_id: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Full body of an object.
    async fn get(&self, space_id: &str, content_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `body` under `content_id`, replacing any previous object.
    ///
    /// `md5` is the hex digest the caller computed; the store returns the digest
    /// it computed itself so the caller can verify the upload.
    async fn put(
        &self,
        space_id: &str,
        content_id: &str,
        body: Vec<u8>,
        mime_type: &str,
        md5: &str,
    ) -> Result<String, StoreError>;

    /// Remove an object.
    async fn delete(&self, space_id: &str, content_id: &str) -> Result<(), StoreError>;
}

/// Source of a store handle, resolved when the auditor is initialized.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Obtain a connected store.
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, StoreError>;
}

/// Connector handing out an already constructed store.
#[derive(Clone)]
pub struct StaticConnector(pub Arc<dyn ObjectStore>);

impl StaticConnector {
    /// Wrap a concrete store.
    pub fn new(store: impl ObjectStore) -> Self {
        Self(Arc::new(store))
    }
}

#[async_trait]
impl StoreConnector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Ok(Arc::clone(&self.0))
    }
}
