//! Bounded retry for remote store calls.
//!
//! Every remote call runs under a request deadline; a call that misses it is
//! reported as [`StoreError::Timeout`] and treated like any other transient
//! failure. Transient failures are retried with exponential backoff until the
//! attempt bound is reached, permanent failures are returned at once.

use std::future::Future;
use std::time::Duration;

use crate::core::{AuditError, StoreError};

/// Attempt bound and backoff for remote operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Deadline for a single remote call.
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Three attempts, 200ms doubling to at most 2s, 30s per request.
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(2),
        backoff_multiplier: 2.0,
        request_timeout: Duration::from_secs(30),
    };

    /// Delay after the given failed attempt (0-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// `operation` names the call in logs and errors; `target` identifies the
    /// space or log it acts on.
    ///
    /// # Errors
    ///
    /// [`AuditError::Store`] for a permanent failure, otherwise
    /// [`AuditError::RetriesExhausted`] carrying the last store error.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        target: &str,
        mut call: F,
    ) -> Result<T, AuditError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.request_timeout)),
            };
            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_transient() {
                tracing::error!(
                    operation,
                    subject = target,
                    attempt,
                    error = %err,
                    "remote call failed permanently"
                );
                return Err(AuditError::Store(err));
            }
            if attempt >= max_attempts {
                tracing::error!(
                    operation,
                    subject = target,
                    attempt,
                    error = %err,
                    "remote call exhausted retries"
                );
                return Err(AuditError::RetriesExhausted {
                    operation,
                    target: target.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }
            tracing::warn!(
                operation,
                subject = target,
                attempt,
                error = %err,
                "remote call failed, retrying"
            );
            tokio::time::sleep(self.delay_for_attempt(attempt - 1)).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
