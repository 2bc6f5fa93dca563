//! Tests for builder modules

use audit_trail::builders::build_auditor;
use audit_trail::config::AuditConfig;
use audit_trail::core::AuditError;
use audit_trail::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_auditor_defaults() {
    let auditor = build_auditor(AuditConfig::default(), TokioSpawner::current()).unwrap();
    assert!(!auditor.is_initialized());
    assert_eq!(auditor.config().audit_space_id, "x-audit");
}

#[tokio::test]
async fn test_build_auditor_rejects_invalid_config() {
    let cfg = AuditConfig {
        log_size_limit_bytes: 0,
        ..AuditConfig::default()
    };
    let err = build_auditor(cfg, TokioSpawner::current())
        .err()
        .expect("invalid config");
    assert!(matches!(err, AuditError::Config(_)));
}
