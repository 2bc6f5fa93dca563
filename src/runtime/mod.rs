//! Runtime adapters and the API surface for hosting services.

pub mod api;
pub mod tokio_spawner;

pub use api::{health, list_audit_logs, AuditLogListing, Health};
pub use tokio_spawner::TokioSpawner;
