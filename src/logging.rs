//! Structured logging setup. `RUST_LOG` controls verbosity; default is
//! `info` so a stock run prints one line per accepted connection, one line
//! per completed request, and warnings for dropped/timed-out connections.

/// Initialise the global logger. Safe to call once, at the top of `main`.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
