//! Tests for error types

use std::error::Error as _;

use audit_trail::core::{AuditError, StoreError};

#[test]
fn test_uninitialized_error() {
    assert_eq!(
        format!("{}", AuditError::Uninitialized),
        "auditor is not initialized"
    );
}

#[test]
fn test_store_error_is_transparent() {
    let err = AuditError::from(StoreError::Permanent("access denied".to_string()));
    assert_eq!(format!("{err}"), "permanent store error: access denied");
}

#[test]
fn test_retries_exhausted_keeps_source() {
    let err = AuditError::RetriesExhausted {
        operation: "push",
        target: "audit/photos-2024-05-01T08:00:00.000Z.tsv".to_string(),
        attempts: 3,
        source: StoreError::Timeout(std::time::Duration::from_secs(30)),
    };
    let source = err.source().expect("source error");
    assert_eq!(source.to_string(), "request timed out after 30s");
}

#[test]
fn test_io_error_conversion() {
    let err = AuditError::from(std::io::Error::other("disk full"));
    assert!(matches!(err, AuditError::Io(_)));
    assert_eq!(format!("{err}"), "cache i/o error: disk full");
}

#[test]
fn test_checksum_mismatch_message() {
    let err = StoreError::ChecksumMismatch {
        expected: "aa".to_string(),
        actual: "bb".to_string(),
    };
    assert_eq!(
        format!("{err}"),
        "checksum mismatch: expected aa, store computed bb"
    );
}

#[test]
fn test_app_result_wraps_audit_errors() {
    use anyhow::Context as _;
    use audit_trail::core::AppResult;

    fn host_startup() -> AppResult<()> {
        Err(AuditError::Config("AUDIT_MAX_ATTEMPTS: invalid digit".to_string()))
            .context("starting audit trail")
    }

    let err = host_startup().unwrap_err();
    assert_eq!(err.to_string(), "starting audit trail");
    assert!(err.downcast_ref::<AuditError>().is_some());
}
