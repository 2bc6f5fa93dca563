//! Tests for utility functions

use audit_trail::util::clock::{format_log_timestamp, next_log_timestamp, parse_log_timestamp};
use audit_trail::util::md5_hex;

#[test]
fn test_md5_hex_is_lower_case() {
    let digest = md5_hex(b"VERSION\tACCOUNT\n");
    assert_eq!(digest.len(), 32);
    assert_eq!(digest, digest.to_lowercase());
}

#[test]
fn test_log_timestamps_sort_chronologically() {
    let earlier = parse_log_timestamp("2024-01-31T23:59:59.999Z").unwrap();
    let later = parse_log_timestamp("2024-02-01T00:00:00.000Z").unwrap();
    assert!(format_log_timestamp(earlier) < format_log_timestamp(later));
}

#[test]
fn test_non_canonical_timestamps_are_rejected() {
    assert!(parse_log_timestamp("2024-01-01T00:00:00Z").is_none());
    assert!(parse_log_timestamp("2024-01-01T00:00:00.0Z").is_none());
    assert!(parse_log_timestamp("2024-01-01 00:00:00.000Z").is_none());
    assert!(parse_log_timestamp("").is_none());
}

#[test]
fn test_next_log_timestamp_is_strictly_later() {
    let future = parse_log_timestamp("2999-12-31T23:59:59.999Z").unwrap();
    let next = next_log_timestamp(Some(future));
    assert!(next > future);
    assert_eq!(format_log_timestamp(next), "3000-01-01T00:00:00.000Z");

    let past = parse_log_timestamp("2000-01-01T00:00:00.000Z").unwrap();
    assert!(next_log_timestamp(Some(past)) > past);
}
