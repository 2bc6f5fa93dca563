//! Debounced flush worker, one per active space.
//!
//! A worker waits until the debounce window since its start has passed and
//! the space is not write-paused, then drains the space's pending events in
//! one step and hands them to the log store. The wait is timer driven and
//! re-evaluated whenever the pause set, the hold or the shutdown state changes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::listener::{RunState, Shared};

/// Lifecycle of one flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPhase {
    /// Spawned, not yet polled.
    Started,
    /// Waiting out the debounce window or a pause.
    Waiting,
    /// Writing the drained batch.
    Flushing,
    /// Batch handled; about to unschedule or start another cycle.
    Done,
}

/// Worker that persists the pending events of a single space.
pub(crate) struct FlushWorker {
    shared: Arc<Shared>,
    space_id: String,
}

impl FlushWorker {
    pub(crate) const fn new(shared: Arc<Shared>, space_id: String) -> Self {
        Self { shared, space_id }
    }

    /// Run flush cycles until the space has nothing pending.
    ///
    /// Events that arrive while a batch is being written start another cycle
    /// with a fresh debounce window instead of a second worker.
    pub(crate) async fn run(self) {
        let mut guard = ScheduleGuard {
            shared: Arc::clone(&self.shared),
            space_id: self.space_id.clone(),
            armed: true,
        };
        loop {
            self.shared.set_phase(&self.space_id, FlushPhase::Waiting);
            if !self.wait(Instant::now()).await {
                tracing::debug!(space_id = %self.space_id, "flush worker discarded");
                let _pool = self.shared.pool.lock();
                guard.release();
                return;
            }

            self.shared.set_phase(&self.space_id, FlushPhase::Flushing);
            self.flush().await;
            self.shared.set_phase(&self.space_id, FlushPhase::Done);

            let pool = self.shared.pool.lock();
            if !pool.has_pending(&self.space_id) || self.shared.run_state() == RunState::Discarding
            {
                guard.release();
                drop(pool);
                tracing::debug!(space_id = %self.space_id, "flush worker finished");
                return;
            }
        }
    }

    /// Wait until flushing may start. Returns `false` when the worker must exit
    /// without flushing.
    async fn wait(&self, start: Instant) -> bool {
        let deadline = start + self.shared.delay;
        loop {
            let changed = self.shared.state_changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let run_state = self.shared.run_state();
            if run_state == RunState::Discarding {
                return false;
            }
            if self.shared.is_held() {
                tracing::trace!(space_id = %self.space_id, "flush held");
                changed.await;
                continue;
            }
            if run_state == RunState::Draining {
                return true;
            }
            let paused = self.shared.is_paused(&self.space_id);
            if !paused && Instant::now() >= deadline {
                return true;
            }
            if paused {
                tracing::trace!(space_id = %self.space_id, "flush paused");
                changed.await;
            } else {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => {}
                    () = &mut changed => {}
                }
            }
        }
    }

    async fn flush(&self) {
        let batch = self.shared.pool.lock().drain_space(&self.space_id);
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        let written = self.shared.log_store.write(&batch).await;
        match written {
            Ok(()) => {
                self.shared.persisted.fetch_add(count as u64, Ordering::AcqRel);
                tracing::debug!(
                    space_id = %self.space_id,
                    events = count,
                    "flushed audit events"
                );
            }
            Err(err) if err.is_retryable() && self.shared.run_state() == RunState::Running => {
                tracing::error!(
                    space_id = %self.space_id,
                    events = count,
                    error = %err,
                    "audit flush failed, re-queueing batch"
                );
                self.shared.pool.lock().requeue_front(batch);
            }
            Err(err) => {
                self.shared.lost.fetch_add(count as u64, Ordering::AcqRel);
                tracing::error!(
                    space_id = %self.space_id,
                    events = count,
                    error = %err,
                    retryable = err.is_retryable(),
                    "audit flush failed, events lost"
                );
            }
        }
    }
}

/// Clears the scheduled entry of a space on every exit path of its worker.
struct ScheduleGuard {
    shared: Arc<Shared>,
    space_id: String,
    armed: bool,
}

impl ScheduleGuard {
    fn release(&mut self) {
        if self.armed {
            self.armed = false;
            self.shared.unschedule(&self.space_id);
        }
    }
}

impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(space_id = %self.space_id, "flush worker ended abnormally");
            self.release();
        }
    }
}
