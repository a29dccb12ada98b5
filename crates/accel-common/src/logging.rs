use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "ACCEL_LOG";

/// Initialize structured logging with environment filter.
/// Set ACCEL_LOG=debug (or trace, info, warn, error) for verbosity control;
/// `ACCEL_LOG=accel_loader=trace` shows every call seen by the tracing layer.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Like [`init_logging`], but tolerates a subscriber already being installed
/// (a host application or a previous loader instance may have set one).
/// Returns whether this call installed it.
pub fn try_init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .is_ok()
}
