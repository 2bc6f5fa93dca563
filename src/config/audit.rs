//! Audit trail configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::RetryPolicy;

/// Prefix of the environment variables read by [`AuditConfig::from_env`].
pub const ENV_PREFIX: &str = "AUDIT_";

/// Configuration of the audit pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Space of the remote store that holds the audit logs.
    pub audit_space_id: String,
    /// Prefix of every log name, e.g. `audit/`.
    pub log_prefix: String,
    /// Internal spaces that never produce audit records (the audit space is always included).
    pub system_spaces: Vec<String>,
    /// Local directory mirroring the current log of each space.
    pub cache_dir: PathBuf,
    /// Size at which a log is closed and a new generation starts.
    pub log_size_limit_bytes: u64,
    /// Quiescence window before a space's pending events are flushed.
    pub flush_delay_ms: u64,
    /// Attempts per remote push or delete.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub retry_initial_delay_ms: u64,
    /// Cap on the delay between retries.
    pub retry_max_delay_ms: u64,
    /// Deadline for a single remote call.
    pub request_timeout_secs: u64,
    /// Whether `stop` flushes pending events before returning.
    pub drain_on_stop: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit_space_id: "x-audit".into(),
            log_prefix: "audit/".into(),
            system_spaces: vec!["x-service-out".into(), "x-service-work".into()],
            cache_dir: std::env::temp_dir().join("audit-trail-cache"),
            log_size_limit_bytes: 2 * 1024 * 1024,
            flush_delay_ms: 5_000,
            max_attempts: 3,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 2_000,
            request_timeout_secs: 30,
            drain_on_stop: true,
        }
    }
}

impl AuditConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.audit_space_id.trim().is_empty() {
            return Err("audit_space_id must not be empty".into());
        }
        if self.log_prefix.contains('\t') || self.log_prefix.contains('\n') {
            return Err("log_prefix must not contain tabs or newlines".into());
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".into());
        }
        if self.log_size_limit_bytes == 0 {
            return Err("log_size_limit_bytes must be greater than 0".into());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".into());
        }
        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            return Err("retry_max_delay_ms must not be below retry_initial_delay_ms".into());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `AUDIT_*` environment variables (after loading
    /// a `.env` file if present), falling back to defaults, and validate.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`AuditConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a validation message.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();
        if let Some(v) = var("SPACE_ID") {
            cfg.audit_space_id = v;
        }
        if let Some(v) = var("LOG_PREFIX") {
            cfg.log_prefix = v;
        }
        if let Some(v) = var("SYSTEM_SPACES") {
            cfg.system_spaces = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("CACHE_DIR") {
            cfg.cache_dir = PathBuf::from(v);
        }
        parse_var(&var, "LOG_SIZE_LIMIT_BYTES", &mut cfg.log_size_limit_bytes)?;
        parse_var(&var, "FLUSH_DELAY_MS", &mut cfg.flush_delay_ms)?;
        parse_var(&var, "MAX_ATTEMPTS", &mut cfg.max_attempts)?;
        parse_var(&var, "RETRY_INITIAL_DELAY_MS", &mut cfg.retry_initial_delay_ms)?;
        parse_var(&var, "RETRY_MAX_DELAY_MS", &mut cfg.retry_max_delay_ms)?;
        parse_var(&var, "REQUEST_TIMEOUT_SECS", &mut cfg.request_timeout_secs)?;
        parse_var(&var, "DRAIN_ON_STOP", &mut cfg.drain_on_stop)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Debounce window as a duration.
    pub const fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    /// Retry policy for remote pushes and deletes.
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            backoff_multiplier: 2.0,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Whether events of `space_id` are excluded from auditing.
    pub fn is_system_space(&self, space_id: &str) -> bool {
        space_id == self.audit_space_id || self.system_spaces.iter().any(|s| s == space_id)
    }
}

fn parse_var<T, F>(var: &F, name: &str, slot: &mut T) -> Result<(), String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))?;
    }
    Ok(())
}
