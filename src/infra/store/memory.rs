//! In-memory object store for development and testing.
//!
//! Besides holding objects, the store can be told to fail the next calls of a
//! given kind, which is how retry and recovery paths are exercised.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::StoreError;
use crate::infra::store::ObjectStore;
use crate::util::checksum::md5_hex;

/// Kind of store call, used for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `spaces`, `space_exists` and `create_space`.
    Spaces,
    /// `list`.
    List,
    /// `get`.
    Get,
    /// `put`.
    Put,
    /// `delete`.
    Delete,
}

/// Object held by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes.
    pub body: Vec<u8>,
    /// Mime type given at upload.
    pub mime_type: String,
    /// Digest computed by the store.
    pub md5: String,
}

#[derive(Default)]
struct Faults {
    pending: HashMap<StoreOp, VecDeque<StoreError>>,
    calls: HashMap<StoreOp, u64>,
}

/// Thread-safe object store kept entirely in memory.
#[derive(Default)]
pub struct InMemoryObjectStore {
    spaces: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    faults: Mutex<Faults>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given spaces already present.
    pub fn with_spaces<I, S>(spaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut guard = store.spaces.lock();
            for space in spaces {
                guard.entry(space.into()).or_default();
            }
        }
        store
    }

    /// Make the next `times` calls of kind `op` fail with `error`.
    pub fn fail_next(&self, op: StoreOp, times: usize, error: StoreError) {
        let mut faults = self.faults.lock();
        let queue = faults.pending.entry(op).or_default();
        queue.extend(std::iter::repeat_n(error, times));
    }

    /// Number of calls of kind `op` seen so far, failed ones included.
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.faults.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of a stored object.
    pub fn object(&self, space_id: &str, content_id: &str) -> Option<StoredObject> {
        self.spaces
            .lock()
            .get(space_id)
            .and_then(|objects| objects.get(content_id))
            .cloned()
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        *faults.calls.entry(op).or_default() += 1;
        match faults.pending.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn spaces(&self) -> Result<Vec<String>, StoreError> {
        self.enter(StoreOp::Spaces)?;
        let mut spaces: Vec<String> = self.spaces.lock().keys().cloned().collect();
        spaces.sort();
        Ok(spaces)
    }

    async fn space_exists(&self, space_id: &str) -> Result<bool, StoreError> {
        self.enter(StoreOp::Spaces)?;
        Ok(self.spaces.lock().contains_key(space_id))
    }

    async fn create_space(&self, space_id: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Spaces)?;
        self.spaces.lock().entry(space_id.to_string()).or_default();
        Ok(())
    }

    async fn list(&self, space_id: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.enter(StoreOp::List)?;
        let spaces = self.spaces.lock();
        let objects = spaces
            .get(space_id)
            .ok_or_else(|| StoreError::NotFound(format!("space {space_id}")))?;
        Ok(objects
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get(&self, space_id: &str, content_id: &str) -> Result<Vec<u8>, StoreError> {
        self.enter(StoreOp::Get)?;
        self.object(space_id, content_id)
            .map(|o| o.body)
            .ok_or_else(|| StoreError::NotFound(format!("{space_id}/{content_id}")))
    }

    async fn put(
        &self,
        space_id: &str,
        content_id: &str,
        body: Vec<u8>,
        mime_type: &str,
        md5: &str,
    ) -> Result<String, StoreError> {
        self.enter(StoreOp::Put)?;
        let computed = md5_hex(&body);
        if computed != md5 {
            return Err(StoreError::ChecksumMismatch {
                expected: md5.to_string(),
                actual: computed,
            });
        }
        let mut spaces = self.spaces.lock();
        let objects = spaces
            .get_mut(space_id)
            .ok_or_else(|| StoreError::NotFound(format!("space {space_id}")))?;
        objects.insert(
            content_id.to_string(),
            StoredObject {
                body,
                mime_type: mime_type.to_string(),
                md5: computed.clone(),
            },
        );
        Ok(computed)
    }

    async fn delete(&self, space_id: &str, content_id: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Delete)?;
        let mut spaces = self.spaces.lock();
        spaces
            .get_mut(space_id)
            .and_then(|objects| objects.remove(content_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{space_id}/{content_id}")))
    }
}
