//! Builders to construct the auditor from configuration.

pub mod auditor_builder;

pub use auditor_builder::{build_auditor, build_auditor_from_env, start_auditor};
