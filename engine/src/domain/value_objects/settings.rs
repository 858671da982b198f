//! Typed tunables of the controller and of the operation log pipeline

use crate::constants::{batch, command, lifecycle, log_pipeline, port};
use std::time::Duration;

/// Timing and policy knobs of port monitoring, command execution,
/// lifecycle waits and batch orchestration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub snapshot_ttl: Duration,
    pub probe_timeout: Duration,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub start_wait: Duration,
    pub stop_wait: Duration,
    pub port_free_wait: Duration,
    pub port_free_poll: Duration,
    pub kill_grace: Duration,
    pub operation_deadline: Duration,
    pub batch_concurrency: usize,
    pub batch_unit_timeout: Duration,
    /// Accept `&&`, `||`, `;` and `|` and run such commands through bash
    pub allow_shell_operators: bool,
    /// Command output bytes captured and returned to callers
    pub max_output_bytes: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_millis(port::SNAPSHOT_TTL_MS),
            probe_timeout: Duration::from_millis(port::PROBE_TIMEOUT_MS),
            command_timeout: Duration::from_secs(command::DEFAULT_TIMEOUT_SEC),
            poll_interval: Duration::from_millis(lifecycle::POLL_INTERVAL_MS),
            start_wait: Duration::from_millis(lifecycle::START_WAIT_MS),
            stop_wait: Duration::from_millis(lifecycle::STOP_WAIT_MS),
            port_free_wait: Duration::from_millis(lifecycle::PORT_FREE_WAIT_MS),
            port_free_poll: Duration::from_millis(lifecycle::PORT_FREE_POLL_MS),
            kill_grace: Duration::from_millis(lifecycle::KILL_GRACE_MS),
            operation_deadline: Duration::from_secs(lifecycle::OPERATION_DEADLINE_SEC),
            batch_concurrency: batch::CONCURRENCY_CAP,
            batch_unit_timeout: Duration::from_secs(batch::UNIT_TIMEOUT_SEC),
            allow_shell_operators: false,
            max_output_bytes: log_pipeline::MAX_OUTPUT_BYTES,
        }
    }
}

/// Sizes and timeouts of the asynchronous operation log writer
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub channel_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub flush_timeout: Duration,
    pub fallback_timeout: Duration,
    pub max_output_bytes: usize,
    pub max_error_bytes: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: log_pipeline::CHANNEL_CAPACITY,
            batch_size: log_pipeline::BATCH_SIZE,
            flush_interval: Duration::from_millis(log_pipeline::FLUSH_INTERVAL_MS),
            flush_timeout: Duration::from_millis(log_pipeline::FLUSH_TIMEOUT_MS),
            fallback_timeout: Duration::from_millis(log_pipeline::FALLBACK_TIMEOUT_MS),
            max_output_bytes: log_pipeline::MAX_OUTPUT_BYTES,
            max_error_bytes: log_pipeline::MAX_ERROR_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_defaults() {
        let settings = ControllerSettings::default();
        assert_eq!(settings.snapshot_ttl, Duration::from_secs(1));
        assert_eq!(settings.command_timeout, Duration::from_secs(5));
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.kill_grace, Duration::from_secs(2));
        assert_eq!(settings.batch_concurrency, 5);
        assert!(!settings.allow_shell_operators);
        assert_eq!(settings.max_output_bytes, 10_000);
    }

    #[test]
    fn test_pipeline_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.channel_capacity, 1000);
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.flush_interval, Duration::from_secs(5));
        assert_eq!(settings.max_output_bytes, 10_000);
        assert_eq!(settings.max_error_bytes, 5_000);
    }
}
