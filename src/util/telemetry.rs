//! Telemetry helpers for structured logging and tracing.

/// Install an env-filtered fmt subscriber unless one is already set.
///
/// The filter comes from `RUST_LOG`. Safe to call more than once.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
