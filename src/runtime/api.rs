//! Response payloads for a hosting service exposing the auditor.

use serde::{Deserialize, Serialize};

use crate::core::{AuditError, Auditor, ListenerStatus, Spawn};

/// Logs of one space, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogListing {
    /// Space the logs belong to.
    pub space_id: String,
    /// Log content ids inside the audit space.
    pub logs: Vec<String>,
}

/// Health response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// The auditor is initialized and accepting events.
    pub ok: bool,
    /// [`Auditor::initialize`] has succeeded.
    pub initialized: bool,
    /// Intake has been stopped.
    pub stopped: bool,
}

/// List the logs of `space_id`.
///
/// # Errors
///
/// Propagates [`Auditor::get_audit_logs`] errors, including not-found.
pub async fn list_audit_logs<S>(
    auditor: &Auditor<S>,
    space_id: &str,
) -> Result<AuditLogListing, AuditError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let listing = auditor.get_audit_logs(space_id).await?;
    Ok(AuditLogListing {
        space_id: space_id.to_string(),
        logs: listing.lines().map(String::from).collect(),
    })
}

/// Report whether the auditor is able to record events.
pub fn health<S>(auditor: &Auditor<S>) -> Health
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    match auditor.status() {
        Ok(status) => Health {
            ok: !status.stopped,
            initialized: true,
            stopped: status.stopped,
        },
        Err(_) => Health {
            ok: false,
            initialized: false,
            stopped: false,
        },
    }
}

/// Listener snapshot, or the reason none is available.
///
/// # Errors
///
/// [`AuditError::Uninitialized`] before initialization.
pub fn status<S>(auditor: &Auditor<S>) -> Result<ListenerStatus, AuditError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    auditor.status()
}
