//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Filter directives: `LINES_LOG`, then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LINES_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns false when one was already set,
/// which happens when several tests or an embedding application got there
/// first.
pub fn init(format: LogFormat) -> bool {
    let builder = fmt().with_env_filter(env_filter()).with_target(true);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
