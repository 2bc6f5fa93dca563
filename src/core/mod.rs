//! Audit pipeline: events, listener, flush workers, log store and auditor.

pub mod auditor;
pub mod error;
pub mod event;
pub mod flush;
pub mod listener;
pub mod log_store;
pub mod retry;

pub use auditor::Auditor;
pub use error::{AppResult, AuditError, StoreError};
pub use event::{
    header_line, Action, ContentEvent, ContentEventBuilder, LOG_COLUMNS, LOG_FORMAT_VERSION,
};
pub use flush::FlushPhase;
pub use listener::{EventListener, ListenerStatus, PendingPool, ShutdownSummary, Spawn};
pub use log_store::{CurrentLog, LogStore, LOG_MIME_TYPE};
pub use retry::RetryPolicy;
