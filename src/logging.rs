use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber once, honoring `RUST_LOG` and
/// defaulting to info-level output.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
