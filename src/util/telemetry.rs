//! Telemetry helpers for structured logging and tracing.

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "audit_trail=info";

/// Initialize tracing. Hosting services can install their own subscriber; this
/// helper installs an env-filtered fmt subscriber only if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
