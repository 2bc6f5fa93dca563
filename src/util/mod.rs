//! Shared utilities.

pub mod checksum;
pub mod clock;
pub mod telemetry;

pub use checksum::md5_hex;
pub use telemetry::init_tracing;
