//! Build and start an [`Auditor`] from configuration.

use crate::config::AuditConfig;
use crate::core::{AuditError, Auditor, Spawn};
use crate::infra::store::StoreConnector;

/// Validate `cfg` and create an uninitialized auditor.
///
/// # Errors
///
/// [`AuditError::Config`] when the configuration is invalid.
pub fn build_auditor<S>(cfg: AuditConfig, spawner: S) -> Result<Auditor<S>, AuditError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate()
        .map_err(|e| AuditError::Config(format!("config invalid: {e}")))?;
    Ok(Auditor::new(cfg, spawner))
}

/// Build an auditor from `AUDIT_*` environment variables.
///
/// # Errors
///
/// [`AuditError::Config`] when a variable cannot be parsed or the result is invalid.
pub fn build_auditor_from_env<S>(spawner: S) -> Result<Auditor<S>, AuditError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let cfg = AuditConfig::from_env().map_err(AuditError::Config)?;
    build_auditor(cfg, spawner)
}

/// Build an auditor, bind it to the store from `connector` and prepare the
/// audit space, which is what a hosting service does at startup.
///
/// # Errors
///
/// Configuration, initialization or remote errors.
pub async fn start_auditor<S>(
    cfg: AuditConfig,
    spawner: S,
    connector: &dyn StoreConnector,
) -> Result<Auditor<S>, AuditError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    let auditor = build_auditor(cfg, spawner)?;
    auditor.initialize(connector).await?;
    let spaces = auditor.create_initial_audit_logs().await?;
    tracing::info!(spaces, "auditor started");
    Ok(auditor)
}
