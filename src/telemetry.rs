//! Tracing setup for hosts and tests.

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with_test_writer()
        .try_init();
}
