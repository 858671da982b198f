//! Tracing subscriber setup

use crate::constants::env::{DEFAULT_LOG_LEVEL, LOG_LEVEL_VAR};
use std::env;
use tracing_subscriber::EnvFilter;

/// Filter directive to use. Priority: `SVCCTL_LOG_LEVEL` > `RUST_LOG` > `info`
pub fn resolve_log_level() -> String {
    env::var(LOG_LEVEL_VAR)
        .or_else(|_| env::var("RUST_LOG"))
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global fmt subscriber, writing to stderr so command output
/// on stdout stays clean. Calling it again is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_new(resolve_log_level())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
