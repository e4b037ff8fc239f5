use tracing_subscriber::EnvFilter;

/// Logs to stdout. `RUST_LOG` overrides the default filter.
pub fn tracing_init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,easefetch=debug,demo_cached_todos=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
