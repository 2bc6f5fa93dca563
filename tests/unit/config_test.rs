//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use audit_trail::config::AuditConfig;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config_is_valid() {
    let cfg = AuditConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.audit_space_id, "x-audit");
    assert_eq!(cfg.log_prefix, "audit/");
    assert_eq!(cfg.flush_delay(), Duration::from_secs(5));
    assert_eq!(cfg.log_size_limit_bytes, 2 * 1024 * 1024);
    assert!(cfg.drain_on_stop);
}

#[test]
fn test_config_invalid_size_limit() {
    let invalid = AuditConfig {
        log_size_limit_bytes: 0,
        ..AuditConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_audit_space() {
    let invalid = AuditConfig {
        audit_space_id: "  ".to_string(),
        ..AuditConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_retry_window() {
    let invalid = AuditConfig {
        retry_initial_delay_ms: 500,
        retry_max_delay_ms: 100,
        ..AuditConfig::default()
    };
    assert!(invalid.validate().is_err());

    let invalid = AuditConfig {
        max_attempts: 0,
        ..AuditConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json_fills_defaults() {
    let cfg = AuditConfig::from_json_str(r#"{"flush_delay_ms": 250, "audit_space_id": "audit"}"#)
        .unwrap();
    assert_eq!(cfg.flush_delay(), Duration::from_millis(250));
    assert_eq!(cfg.audit_space_id, "audit");
    assert_eq!(cfg.max_attempts, 3);

    assert!(AuditConfig::from_json_str(r#"{"max_attempts": 0}"#).is_err());
    assert!(AuditConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_from_lookup() {
    let cfg = AuditConfig::from_lookup(lookup(&[
        ("AUDIT_SPACE_ID", "audit-logs"),
        ("AUDIT_SYSTEM_SPACES", "internal, scratch ,"),
        ("AUDIT_FLUSH_DELAY_MS", "1000"),
        ("AUDIT_DRAIN_ON_STOP", "false"),
    ]))
    .unwrap();
    assert_eq!(cfg.audit_space_id, "audit-logs");
    assert_eq!(cfg.system_spaces, ["internal", "scratch"]);
    assert_eq!(cfg.flush_delay_ms, 1000);
    assert!(!cfg.drain_on_stop);
    assert!(cfg.is_system_space("audit-logs"));
    assert!(cfg.is_system_space("scratch"));
    assert!(!cfg.is_system_space("x-service-out"));
}

#[test]
fn test_config_from_lookup_names_bad_variable() {
    let err = AuditConfig::from_lookup(lookup(&[("AUDIT_MAX_ATTEMPTS", "many")])).unwrap_err();
    assert!(err.contains("AUDIT_MAX_ATTEMPTS"));
}
