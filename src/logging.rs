//! Structured logging bootstrap, replacing the original implementation's
//! hand-rolled ANSI `Colors` class with `tracing`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a process-wide `tracing` subscriber. Honors `RUST_LOG` if set,
/// otherwise defaults to `info` (role transitions, committed writes) with
/// `debug` available for heartbeat/vote traffic.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}
