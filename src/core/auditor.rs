//! Lifecycle façade over the listener and log store.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::config::AuditConfig;
use crate::core::listener::{EventListener, ListenerStatus, ShutdownSummary, Spawn};
use crate::core::{AuditError, ContentEvent, LogStore};
use crate::infra::store::{ObjectStore, StoreConnector};

struct Pipeline<S> {
    store: Arc<dyn ObjectStore>,
    log_store: Arc<LogStore>,
    listener: EventListener<S>,
}

/// Releases a listener's flush hold when dropped.
struct ReleaseOnDrop<S>(EventListener<S>)
where
    S: Spawn + Clone + Send + Sync + 'static;

impl<S> Drop for ReleaseOnDrop<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.0.release_flushes();
    }
}

/// Entry point used by the hosting service.
///
/// Nothing works until [`Auditor::initialize`] has bound the auditor to a
/// store; every other operation fails with [`AuditError::Uninitialized`]
/// before that.
pub struct Auditor<S> {
    config: Arc<AuditConfig>,
    spawner: S,
    pipeline: RwLock<Option<Arc<Pipeline<S>>>>,
    /// Serializes pipeline replacement and shutdown.
    lifecycle: Mutex<()>,
}

impl<S> Auditor<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create an uninitialized auditor.
    pub fn new(config: AuditConfig, spawner: S) -> Self {
        Self {
            config: Arc::new(config),
            spawner,
            pipeline: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Configuration the auditor was built with.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Bind to the store obtained from `connector` and start the pipeline.
    ///
    /// Re-initializing installs the new pipeline at once so no event is
    /// refused, but holds its flushes until the previous pipeline has shut
    /// down, draining it if the configuration says so. Write pauses carry
    /// over. Concurrent calls run one after the other.
    ///
    /// # Errors
    ///
    /// [`AuditError::Initialization`] when no store handle can be obtained or
    /// the cache directory cannot be created.
    pub async fn initialize(&self, connector: &dyn StoreConnector) -> Result<(), AuditError> {
        let _lifecycle = self.lifecycle.lock().await;
        let store = connector
            .connect()
            .await
            .map_err(|e| AuditError::Initialization(format!("cannot obtain store: {e}")))?;
        tokio::fs::create_dir_all(&self.config.cache_dir)
            .await
            .map_err(|e| {
                AuditError::Initialization(format!(
                    "cannot create cache dir {}: {e}",
                    self.config.cache_dir.display()
                ))
            })?;

        let log_store = Arc::new(LogStore::new(Arc::clone(&store), &self.config));
        let listener = EventListener::new(
            Arc::clone(&log_store),
            Arc::clone(&self.config),
            self.spawner.clone(),
        );
        let previous = {
            let mut slot = self.pipeline.write();
            let previous = slot.take();
            if let Some(old) = &previous {
                listener.hold_flushes();
                for space_id in old.listener.paused_spaces() {
                    listener.set_write_paused(&space_id, true);
                }
            }
            *slot = Some(Arc::new(Pipeline {
                store,
                log_store,
                listener: listener.clone(),
            }));
            previous
        };
        if let Some(old) = previous {
            let _release = ReleaseOnDrop(listener);
            tracing::info!("re-initializing auditor, shutting down previous pipeline");
            old.listener.shutdown(self.config.drain_on_stop).await;
        }
        tracing::info!(audit_space = %self.config.audit_space_id, "auditor initialized");
        Ok(())
    }

    /// Whether [`Auditor::initialize`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.pipeline.read().is_some()
    }

    fn pipeline(&self) -> Result<Arc<Pipeline<S>>, AuditError> {
        self.pipeline.read().clone().ok_or(AuditError::Uninitialized)
    }

    /// Forward a content event to the listener.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`] or [`AuditError::InvalidArgument`].
    pub fn on_content_event(&self, event: ContentEvent) -> Result<(), AuditError> {
        self.pipeline()?.listener.on_content_event(event)
    }

    /// Suppress or resume flushing for a space.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`].
    pub fn set_write_paused(&self, space_id: &str, paused: bool) -> Result<(), AuditError> {
        self.pipeline()?.listener.set_write_paused(space_id, paused);
        Ok(())
    }

    /// Make sure the audit space exists and every space is ready to be audited.
    ///
    /// Logs are created lazily on the first event of a space, so existing
    /// spaces need no migration. Returns the number of spaces inspected.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`] or remote errors after retries.
    pub async fn create_initial_audit_logs(&self) -> Result<usize, AuditError> {
        let pipeline = self.pipeline()?;
        pipeline.log_store.ensure_audit_space().await?;
        let spaces = self
            .config
            .retry_policy()
            .run("spaces", &self.config.audit_space_id, || pipeline.store.spaces())
            .await?;
        let mut inspected = 0;
        for space_id in spaces.iter().filter(|s| !self.config.is_system_space(s)) {
            inspected += 1;
            tracing::debug!(
                space_id = %space_id,
                "audit log container ready, no migration required"
            );
        }
        tracing::info!(spaces = inspected, "initial audit logs checked");
        Ok(inspected)
    }

    /// Newline-separated names of every log of `space_id`, oldest first.
    ///
    /// # Errors
    ///
    /// [`AuditError::NotFound`] when the space has no logs;
    /// [`AuditError::Uninitialized`] before initialization.
    pub async fn get_audit_logs(&self, space_id: &str) -> Result<String, AuditError> {
        let pipeline = self.pipeline()?;
        let logs = pipeline.log_store.logs(space_id).await;
        if logs.is_empty() {
            return Err(AuditError::NotFound(format!("no audit logs for space {space_id}")));
        }
        Ok(logs.join("\n"))
    }

    /// Administratively delete one log.
    ///
    /// # Errors
    ///
    /// [`AuditError::RetriesExhausted`] when the remote copy survives;
    /// [`AuditError::Uninitialized`] before initialization.
    pub async fn remove_log(&self, log_content_id: &str) -> Result<(), AuditError> {
        self.pipeline()?.log_store.remove_log(log_content_id).await
    }

    /// Stop accepting events; pending ones are drained or dropped per configuration.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`].
    pub fn stop(&self) -> Result<(), AuditError> {
        self.pipeline()?.listener.stop();
        Ok(())
    }

    /// Stop accepting events and wait for all workers.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`].
    pub async fn shutdown(&self, drain: bool) -> Result<ShutdownSummary, AuditError> {
        let _lifecycle = self.lifecycle.lock().await;
        let pipeline = self.pipeline()?;
        Ok(pipeline.listener.shutdown(drain).await)
    }

    /// Snapshot of the listener state.
    ///
    /// # Errors
    ///
    /// [`AuditError::Uninitialized`].
    pub fn status(&self) -> Result<ListenerStatus, AuditError> {
        Ok(self.pipeline()?.listener.status())
    }
}
