//! Configuration models for the audit pipeline.

pub mod audit;

pub use audit::AuditConfig;
