//! Per-space audit logs: naming, rotation, local cache and remote persistence.
//!
//! A space's audit trail is a sequence of TSV logs named
//! `<prefix><space>-<timestamp>.tsv` inside the audit space of the remote
//! store. The newest log below the size limit is the *current* log; flushes
//! append to a local copy of it and re-upload the whole file, so a retried
//! upload always carries the same bytes and checksum.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::config::AuditConfig;
use crate::core::event::header_line;
use crate::core::{AuditError, ContentEvent, RetryPolicy, StoreError};
use crate::infra::store::ObjectStore;
use crate::util::checksum::md5_hex;
use crate::util::clock;

/// Mime type of uploaded logs.
pub const LOG_MIME_TYPE: &str = "text/tab-separated-values";

/// File extension of log names.
pub const LOG_EXTENSION: &str = ".tsv";

/// Log selected to receive the next flush of a space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLog {
    /// Content id of the log in the audit space.
    pub name: String,
    /// Local cache copy.
    pub path: PathBuf,
    /// Creation time encoded in the name.
    pub created_at: DateTime<Utc>,
}

/// Owns the local and remote representation of every space's audit trail.
pub struct LogStore {
    store: Arc<dyn ObjectStore>,
    audit_space_id: String,
    prefix: String,
    cache_dir: PathBuf,
    size_limit: u64,
    retry: RetryPolicy,
}

impl LogStore {
    /// Create a log store persisting into `store` as configured.
    pub fn new(store: Arc<dyn ObjectStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            audit_space_id: config.audit_space_id.clone(),
            prefix: config.log_prefix.clone(),
            cache_dir: config.cache_dir.clone(),
            size_limit: config.log_size_limit_bytes,
            retry: config.retry_policy(),
        }
    }

    /// Space of the remote store holding the logs.
    pub fn audit_space_id(&self) -> &str {
        &self.audit_space_id
    }

    /// Log name for a generation of `space_id` created at `created_at`.
    pub fn log_name(&self, space_id: &str, created_at: DateTime<Utc>) -> String {
        format!(
            "{}{space_id}-{}{LOG_EXTENSION}",
            self.prefix,
            clock::format_log_timestamp(created_at)
        )
    }

    /// Creation time of `name` if it is a log of `space_id`.
    pub fn log_timestamp(&self, space_id: &str, name: &str) -> Option<DateTime<Utc>> {
        parse_log_name(&self.prefix, space_id, name)
    }

    /// Append a batch of events of one space to its current log and persist it.
    ///
    /// On failure the local copy is restored to its previous length, so the
    /// same batch can be written again without being recorded twice.
    ///
    /// # Errors
    ///
    /// [`AuditError::InvalidArgument`] when the batch mixes spaces; cache I/O
    /// or remote errors otherwise.
    pub async fn write(&self, events: &[ContentEvent]) -> Result<(), AuditError> {
        let Some(first) = events.first() else {
            tracing::warn!("ignoring empty audit batch");
            return Ok(());
        };
        let space_id = first.space_id();
        if let Some(other) = events.iter().find(|e| e.space_id() != space_id) {
            return Err(AuditError::InvalidArgument(format!(
                "batch mixes spaces `{space_id}` and `{}`",
                other.space_id()
            )));
        }

        let current = self.current_log(space_id).await?;
        let previous_len = tokio::fs::metadata(&current.path).await?.len();
        let lines: Vec<String> = events.iter().map(ContentEvent::to_tsv_line).collect();
        let path = current.path.clone();
        let appended = blocking(move || append(&path, previous_len == 0, &lines)).await;
        let outcome = match appended {
            Ok(()) => self.push(&current).await,
            Err(e) => Err(e.into()),
        };
        if let Err(err) = outcome {
            let path = current.path.clone();
            if let Err(e) = blocking(move || rollback(&path, previous_len)).await {
                tracing::error!(
                    log = %current.name,
                    error = %e,
                    "could not roll back cached audit log"
                );
            }
            return Err(err);
        }
        tracing::debug!(
            space_id,
            log = %current.name,
            events = events.len(),
            "audit batch persisted"
        );
        Ok(())
    }

    /// Names of all remote logs of `space_id`, oldest first.
    ///
    /// A failed listing is logged and reported as no logs.
    pub async fn logs(&self, space_id: &str) -> Vec<String> {
        let prefix = format!("{}{space_id}-", self.prefix);
        let listed = self
            .retry
            .run("list", space_id, || self.store.list(&self.audit_space_id, &prefix))
            .await;
        match listed {
            Ok(ids) => {
                let mut names: Vec<String> = ids
                    .into_iter()
                    .filter(|id| self.log_timestamp(space_id, id).is_some())
                    .collect();
                names.sort();
                names
            }
            Err(AuditError::Store(StoreError::NotFound(_))) => Vec::new(),
            Err(err) => {
                tracing::warn!(space_id, error = %err, "listing audit logs failed");
                Vec::new()
            }
        }
    }

    /// Delete a log locally (best effort) and remotely (with retry).
    ///
    /// # Errors
    ///
    /// [`AuditError::RetriesExhausted`] when the remote copy could not be removed.
    pub async fn remove_log(&self, log_content_id: &str) -> Result<(), AuditError> {
        let local = self.cache_path(log_content_id)?;
        match tokio::fs::remove_file(&local).await {
            Ok(()) => tracing::debug!(log = log_content_id, "removed cached audit log"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    log = log_content_id,
                    error = %e,
                    "could not remove cached audit log"
                );
            }
        }

        let deleted = self
            .retry
            .run("delete", log_content_id, || {
                self.store.delete(&self.audit_space_id, log_content_id)
            })
            .await;
        match deleted {
            Ok(()) => {
                tracing::info!(log = log_content_id, "audit log removed");
                Ok(())
            }
            Err(AuditError::Store(StoreError::NotFound(_))) => {
                tracing::debug!(log = log_content_id, "audit log already absent remotely");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Create the audit space if it does not exist yet; returns whether it was created.
    ///
    /// # Errors
    ///
    /// Remote errors after retries.
    pub async fn ensure_audit_space(&self) -> Result<bool, AuditError> {
        let space = self.audit_space_id.as_str();
        let exists = self
            .retry
            .run("stat", space, || self.store.space_exists(space))
            .await?;
        if exists {
            return Ok(false);
        }
        self.retry
            .run("create", space, || self.store.create_space(space))
            .await?;
        tracing::info!(space_id = space, "created audit space");
        Ok(true)
    }

    /// Resolve the log the next flush of `space_id` appends to.
    ///
    /// Prefers the newest cached log, then the newest remote log (downloaded
    /// into the cache). A new generation is started when neither exists or the
    /// selected log has reached the size limit; its timestamp is strictly later
    /// than the selected log's.
    ///
    /// # Errors
    ///
    /// Cache I/O errors or a failed download.
    pub async fn current_log(&self, space_id: &str) -> Result<CurrentLog, AuditError> {
        let cached = self.cached_logs(space_id).await?;
        let selected = match cached.last() {
            Some(log) => Some(log.clone()),
            None => match self.logs(space_id).await.pop() {
                Some(name) => Some(self.download(space_id, name).await?),
                None => None,
            },
        };

        if let Some(log) = &selected {
            let size = tokio::fs::metadata(&log.path).await?.len();
            if size < self.size_limit {
                return Ok(log.clone());
            }
            tracing::info!(
                space_id,
                log = %log.name,
                size,
                "audit log reached size limit, rotating"
            );
        }

        let created_at = clock::next_log_timestamp(selected.as_ref().map(|l| l.created_at));
        let name = self.log_name(space_id, created_at);
        let path = self.cache_path(&name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        for old in cached.iter().chain(selected.iter()) {
            if let Err(e) = tokio::fs::remove_file(&old.path).await {
                tracing::debug!(log = %old.name, error = %e, "could not evict rotated audit log");
            }
        }
        tracing::info!(space_id, log = %name, "started new audit log");
        Ok(CurrentLog {
            name,
            path,
            created_at,
        })
    }

    async fn cached_logs(&self, space_id: &str) -> Result<Vec<CurrentLog>, AuditError> {
        let cache_dir = self.cache_dir.clone();
        let prefix = self.prefix.clone();
        let space_id = space_id.to_string();
        Ok(blocking(move || Ok(scan_cache(&cache_dir, &prefix, &space_id))).await?)
    }

    async fn download(&self, space_id: &str, name: String) -> Result<CurrentLog, AuditError> {
        let created_at = self.log_timestamp(space_id, &name).ok_or_else(|| {
            AuditError::InvalidArgument(format!("`{name}` is not a log of space `{space_id}`"))
        })?;
        let body = self
            .retry
            .run("download", &name, || self.store.get(&self.audit_space_id, &name))
            .await?;
        let path = self.cache_path(&name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        tracing::debug!(space_id, log = %name, "downloaded current audit log into cache");
        Ok(CurrentLog {
            name,
            path,
            created_at,
        })
    }

    async fn push(&self, log: &CurrentLog) -> Result<(), AuditError> {
        let body = tokio::fs::read(&log.path).await?;
        let md5 = md5_hex(&body);
        match self.upload(&log.name, &body, &md5).await {
            Err(AuditError::Store(StoreError::NotFound(_))) => {
                self.ensure_audit_space().await?;
                self.upload(&log.name, &body, &md5).await
            }
            other => other,
        }
    }

    async fn upload(&self, name: &str, body: &[u8], md5: &str) -> Result<(), AuditError> {
        self.retry
            .run("push", name, || {
                let body = body.to_vec();
                async move {
                    let stored = self
                        .store
                        .put(&self.audit_space_id, name, body, LOG_MIME_TYPE, md5)
                        .await?;
                    if stored == md5 {
                        Ok(())
                    } else {
                        Err(StoreError::ChecksumMismatch {
                            expected: md5.to_string(),
                            actual: stored,
                        })
                    }
                }
            })
            .await
    }

    fn cache_path(&self, log_content_id: &str) -> Result<PathBuf, AuditError> {
        let mut path = self.cache_dir.clone();
        for part in log_content_id.split('/') {
            if part.is_empty() || part == "." || part == ".." {
                return Err(AuditError::InvalidArgument(format!(
                    "invalid log id `{log_content_id}`"
                )));
            }
            path.push(part);
        }
        Ok(path)
    }
}

/// Run blocking cache I/O on the blocking thread pool.
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(io::Error::other)?
}

fn parse_log_name(prefix: &str, space_id: &str, name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(prefix)?
        .strip_prefix(space_id)?
        .strip_prefix('-')?
        .strip_suffix(LOG_EXTENSION)?;
    clock::parse_log_timestamp(stamp)
}

/// Cached logs of `space_id`, ordered by name.
fn scan_cache(cache_dir: &Path, prefix: &str, space_id: &str) -> Vec<CurrentLog> {
    let mut logs: Vec<CurrentLog> = WalkDir::new(cache_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(cache_dir).ok()?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let created_at = parse_log_name(prefix, space_id, &name)?;
            Some(CurrentLog {
                name,
                path: entry.path().to_path_buf(),
                created_at,
            })
        })
        .collect();
    logs.sort_by(|a, b| a.name.cmp(&b.name));
    logs
}

fn append(path: &Path, needs_header: bool, lines: &[String]) -> io::Result<()> {
    let file = OpenOptions::new().append(true).open(path)?;
    let mut out = BufWriter::new(file);
    if needs_header {
        writeln!(out, "{}", header_line())?;
    }
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    out.get_ref().sync_data()
}

fn rollback(path: &Path, previous_len: u64) -> io::Result<()> {
    if previous_len == 0 {
        std::fs::remove_file(path)
    } else {
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|f| f.set_len(previous_len))
    }
}
