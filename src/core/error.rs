//! Error types for audit trail operations.

use thiserror::Error;

/// Errors reported by a remote object store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Network or service hiccup; the call may succeed if repeated.
    #[error("transient store error: {0}")]
    Transient(String),
    /// The store rejected the call and repeating it will not help.
    #[error("permanent store error: {0}")]
    Permanent(String),
    /// The requested space or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The checksum computed by the store differs from the one supplied.
    #[error("checksum mismatch: expected {expected}, store computed {actual}")]
    ChecksumMismatch {
        /// Checksum supplied with the upload.
        expected: String,
        /// Checksum reported by the store.
        actual: String,
    },
    /// The request did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl StoreError {
    /// Whether repeating the failed call is worthwhile.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::ChecksumMismatch { .. } | Self::Timeout(_)
        )
    }
}

/// Errors produced by the audit trail engine.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The caller supplied an unusable argument (missing space, mixed batch, bad line).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An auditor operation was called before `initialize`.
    #[error("auditor is not initialized")]
    Uninitialized,
    /// The remote store handle could not be obtained.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// No audit history exists for the requested space.
    #[error("not found: {0}")]
    NotFound(String),
    /// A remote operation kept failing until the attempt bound was reached.
    #[error("{operation} of {target} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Operation name (`push`, `delete`).
        operation: &'static str,
        /// Space or log identity the operation targeted.
        target: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error returned by the store.
        #[source]
        source: StoreError,
    },
    /// A non-retryable store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Local cache I/O failure.
    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl AuditError {
    /// Whether writing the same batch again later may succeed.
    ///
    /// Only remote failures that stayed transient until the attempt bound was
    /// reached qualify; rejected arguments, permanent store errors and local
    /// I/O failures do not.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RetriesExhausted { .. } => true,
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
