//! `tracing` subscriber installation.
//!
//! Every entry point uses `try_init`, so calling more than once (or after a
//! subscriber was installed elsewhere) is a no-op rather than a panic.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// JSON logs with timestamps, filtered through `RUST_LOG` (default `info`).
pub fn init() {
    init_with(LogFormat::Json);
}

pub fn init_with(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .with_timer(SystemTime)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}

/// Route logs through the test harness so they show up only for failing
/// tests. Defaults to `debug` unless `RUST_LOG` says otherwise.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
