//! Event ingress: pending pool and per-space flush scheduling.
//!
//! Producers hand content events to [`EventListener::on_content_event`], which
//! only appends to an in-memory pool and, if the space has no worker yet,
//! spawns one. All shared state is guarded per structure:
//!
//! - the pending pool and the stopped flag (one mutex, taken first),
//! - the scheduled workers and their phase (taken second),
//! - the write-paused spaces.
//!
//! Appending an event and scheduling its worker happen under the pool lock,
//! and a worker only unschedules itself under the same lock after checking
//! that nothing new arrived. No event can be left in the pool without a worker.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::AuditConfig;
use crate::core::flush::{FlushPhase, FlushWorker};
use crate::core::{AuditError, ContentEvent, LogStore};

/// Abstraction for spawning flush workers on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Events accepted but not yet persisted, queued FIFO per space.
#[derive(Debug, Default)]
pub struct PendingPool {
    queues: HashMap<String, VecDeque<ContentEvent>>,
    len: usize,
}

impl PendingPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event behind earlier events of its space.
    pub fn push(&mut self, event: ContentEvent) {
        self.queues
            .entry(event.space_id().to_string())
            .or_default()
            .push_back(event);
        self.len += 1;
    }

    /// Remove and return every pending event of `space_id`, oldest first.
    pub fn drain_space(&mut self, space_id: &str) -> Vec<ContentEvent> {
        let batch: Vec<ContentEvent> = self
            .queues
            .remove(space_id)
            .map(Vec::from)
            .unwrap_or_default();
        self.len -= batch.len();
        batch
    }

    /// Put a batch that failed to persist back in front of newer events of its space.
    pub fn requeue_front(&mut self, batch: Vec<ContentEvent>) {
        for event in batch.into_iter().rev() {
            self.len += 1;
            self.queues
                .entry(event.space_id().to_string())
                .or_default()
                .push_front(event);
        }
    }

    /// Whether `space_id` has pending events.
    pub fn has_pending(&self, space_id: &str) -> bool {
        self.queues.get(space_id).is_some_and(|q| !q.is_empty())
    }

    /// Number of pending events over all spaces.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no events are pending.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every pending event and return how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.queues.clear();
        self.len = 0;
        dropped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RunState {
    Running = 0,
    Draining = 1,
    Discarding = 2,
}

/// State shared between the listener and its workers.
pub(crate) struct Shared {
    pub(crate) pool: Mutex<PendingPool>,
    pub(crate) scheduled: Mutex<HashMap<String, FlushPhase>>,
    paused: Mutex<HashSet<String>>,
    /// Pause changes and shutdown requests.
    pub(crate) state_changed: Notify,
    /// A worker left `scheduled`.
    idle: Notify,
    run_state: AtomicU8,
    /// Workers wait, even while draining, until the hold is released.
    held: AtomicBool,
    pub(crate) delay: Duration,
    pub(crate) log_store: Arc<LogStore>,
    config: Arc<AuditConfig>,
    pub(crate) persisted: AtomicU64,
    pub(crate) lost: AtomicU64,
}

impl Shared {
    pub(crate) fn run_state(&self) -> RunState {
        match self.run_state.load(Ordering::Acquire) {
            0 => RunState::Running,
            1 => RunState::Draining,
            _ => RunState::Discarding,
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub(crate) fn is_paused(&self, space_id: &str) -> bool {
        self.paused.lock().contains(space_id)
    }

    pub(crate) fn set_phase(&self, space_id: &str, phase: FlushPhase) {
        if let Some(slot) = self.scheduled.lock().get_mut(space_id) {
            *slot = phase;
        }
    }

    /// Remove `space_id` from the scheduled workers. Callers hold the pool lock
    /// unless the worker is being torn down abnormally.
    pub(crate) fn unschedule(&self, space_id: &str) {
        self.scheduled.lock().remove(space_id);
        self.idle.notify_waiters();
    }
}

/// Point-in-time view of the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStatus {
    /// Events accepted but not yet persisted.
    pub pending_events: usize,
    /// Spaces with a live flush worker and the phase it is in.
    pub workers: BTreeMap<String, FlushPhase>,
    /// Spaces whose flushing is suppressed.
    pub paused_spaces: Vec<String>,
    /// Whether intake has stopped.
    pub stopped: bool,
    /// Events persisted since start.
    pub persisted_events: u64,
    /// Events whose batch failed for good and was dropped.
    pub lost_events: u64,
}

/// Outcome of [`EventListener::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShutdownSummary {
    /// Events persisted over the listener's lifetime.
    pub persisted: u64,
    /// Pending events dropped because shutdown did not drain.
    pub discarded: usize,
    /// Events whose batch failed for good, while running or draining.
    pub lost: u64,
}

/// Receives content events and schedules one debounced flush worker per space.
pub struct EventListener<S> {
    shared: Arc<Shared>,
    spawner: S,
}

impl<S: Clone> Clone for EventListener<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> EventListener<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a listener flushing into `log_store` with an empty pool.
    pub fn new(log_store: Arc<LogStore>, config: Arc<AuditConfig>, spawner: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool: Mutex::new(PendingPool::new()),
                scheduled: Mutex::new(HashMap::new()),
                paused: Mutex::new(HashSet::new()),
                state_changed: Notify::new(),
                idle: Notify::new(),
                run_state: AtomicU8::new(RunState::Running as u8),
                held: AtomicBool::new(false),
                delay: config.flush_delay(),
                log_store,
                config,
                persisted: AtomicU64::new(0),
                lost: AtomicU64::new(0),
            }),
            spawner,
        }
    }

    /// Keep every worker from writing until [`EventListener::release_flushes`].
    ///
    /// Events are still accepted and debounce windows still run. A held
    /// worker also waits during a draining shutdown; a discarding one ends it.
    pub fn hold_flushes(&self) {
        self.shared.held.store(true, Ordering::Release);
    }

    /// Let held workers proceed.
    pub fn release_flushes(&self) {
        if self.shared.held.swap(false, Ordering::AcqRel) {
            tracing::debug!("audit flushes released");
            self.shared.state_changed.notify_waiters();
        }
    }

    /// Accept one content event.
    ///
    /// Events of system spaces and events arriving after stop are dropped
    /// silently. Never blocks on I/O.
    ///
    /// # Errors
    ///
    /// [`AuditError::InvalidArgument`] when the event has no space id.
    pub fn on_content_event(&self, event: ContentEvent) -> Result<(), AuditError> {
        event.validate()?;
        if self.shared.config.is_system_space(event.space_id()) {
            tracing::trace!(space_id = event.space_id(), "ignoring system space event");
            return Ok(());
        }
        let mut pool = self.shared.pool.lock();
        if self.shared.run_state() != RunState::Running {
            tracing::debug!(space_id = event.space_id(), "listener stopped, dropping event");
            return Ok(());
        }
        let space_id = event.space_id().to_string();
        pool.push(event);
        self.schedule_locked(&space_id, &pool);
        Ok(())
    }

    /// Start a flush worker for `space_id` unless one is already scheduled.
    pub fn schedule_flush(&self, space_id: &str) {
        let pool = self.shared.pool.lock();
        self.schedule_locked(space_id, &pool);
    }

    fn schedule_locked(&self, space_id: &str, _pool: &PendingPool) {
        let fresh = {
            let mut scheduled = self.shared.scheduled.lock();
            if scheduled.contains_key(space_id) {
                false
            } else {
                scheduled.insert(space_id.to_string(), FlushPhase::Started);
                true
            }
        };
        if fresh {
            tracing::debug!(space_id, "scheduling flush worker");
            let worker = FlushWorker::new(Arc::clone(&self.shared), space_id.to_string());
            self.spawner.spawn(worker.run());
        }
    }

    /// Suppress or resume flushing of `space_id`.
    pub fn set_write_paused(&self, space_id: &str, paused: bool) {
        let changed = {
            let mut set = self.shared.paused.lock();
            if paused {
                set.insert(space_id.to_string())
            } else {
                set.remove(space_id)
            }
        };
        if changed {
            tracing::info!(space_id, paused, "audit writes pause state changed");
            self.shared.state_changed.notify_waiters();
        }
    }

    /// Whether flushing of `space_id` is suppressed.
    pub fn is_write_paused(&self, space_id: &str) -> bool {
        self.shared.is_paused(space_id)
    }

    /// Write-paused spaces, sorted.
    pub fn paused_spaces(&self) -> Vec<String> {
        let mut spaces: Vec<String> = self.shared.paused.lock().iter().cloned().collect();
        spaces.sort();
        spaces
    }

    /// Stop accepting events without waiting for workers.
    ///
    /// Pending events are flushed by their workers when the listener is
    /// configured to drain on stop, and discarded otherwise.
    pub fn stop(&self) {
        self.begin_shutdown(self.shared.config.drain_on_stop);
    }

    /// Whether intake has stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.run_state() != RunState::Running
    }

    /// Stop accepting events and wait for every worker to finish.
    ///
    /// With `drain` every pending event is flushed immediately, ignoring the
    /// debounce window and pause requests but not a flush hold; without it
    /// pending events are dropped and workers exit without flushing.
    pub async fn shutdown(&self, drain: bool) -> ShutdownSummary {
        let discarded = self.begin_shutdown(drain);
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.shared.scheduled.lock().is_empty() {
                break;
            }
            idle.await;
        }
        let summary = ShutdownSummary {
            persisted: self.shared.persisted.load(Ordering::Acquire),
            discarded,
            lost: self.shared.lost.load(Ordering::Acquire),
        };
        tracing::info!(
            persisted = summary.persisted,
            discarded = summary.discarded,
            lost = summary.lost,
            "audit listener shut down"
        );
        summary
    }

    fn begin_shutdown(&self, drain: bool) -> usize {
        let discarded = {
            let mut pool = self.shared.pool.lock();
            if self.shared.run_state() != RunState::Running {
                return 0;
            }
            let next = if drain {
                RunState::Draining
            } else {
                RunState::Discarding
            };
            self.shared.run_state.store(next as u8, Ordering::Release);
            if drain {
                0
            } else {
                pool.clear()
            }
        };
        if discarded > 0 {
            tracing::warn!(discarded, "discarding pending audit events on shutdown");
        }
        self.shared.state_changed.notify_waiters();
        discarded
    }

    /// Snapshot of pool, workers and pause state.
    pub fn status(&self) -> ListenerStatus {
        let pending_events = self.shared.pool.lock().len();
        let workers = self
            .shared
            .scheduled
            .lock()
            .iter()
            .map(|(space, phase)| (space.clone(), *phase))
            .collect();
        ListenerStatus {
            pending_events,
            workers,
            paused_spaces: self.paused_spaces(),
            stopped: self.is_stopped(),
            persisted_events: self.shared.persisted.load(Ordering::Acquire),
            lost_events: self.shared.lost.load(Ordering::Acquire),
        }
    }

    /// Log store the workers flush into.
    pub fn log_store(&self) -> &Arc<LogStore> {
        &self.shared.log_store
    }
}
