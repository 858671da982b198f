//! Application-wide constants and default values
//!
//! Every tunable of the controller and the log pipeline has its default here.
//! Settings structs read these; call sites never hard-code durations.

/// Port monitoring defaults
pub mod port {
    /// Lifetime of a port snapshot before the next read rebuilds it (milliseconds)
    pub const SNAPSHOT_TTL_MS: u64 = 1_000;

    /// Connect timeout of a single liveness probe (milliseconds)
    pub const PROBE_TIMEOUT_MS: u64 = 50;

    /// Addresses probed by `is_port_in_use`: loopback, any, IPv6 any
    pub const PROBE_HOSTS: [&str; 3] = ["127.0.0.1", "0.0.0.0", "::"];

    /// Lowest and highest valid TCP port
    pub const MIN_PORT: u32 = 1;
    pub const MAX_PORT: u32 = 65_535;
}

/// Command execution defaults
pub mod command {
    /// Default execution timeout for lifecycle commands (seconds)
    pub const DEFAULT_TIMEOUT_SEC: u64 = 5;

    /// Maximum accepted command length (bytes)
    pub const MAX_LENGTH: usize = 1_000;

    /// Time allowed for output pipes to drain once the child is gone (milliseconds)
    pub const OUTPUT_DRAIN_GRACE_MS: u64 = 100;

    /// Shell used for commands carrying control operators
    pub const SHELL: &str = "/bin/bash";

    /// Only PATH exported to children
    pub const CHILD_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
}

/// Lifecycle wait windows
pub mod lifecycle {
    /// Interval between port polls while waiting for a start/stop to take effect (milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 500;

    /// How long a start may take to bind its port (milliseconds)
    pub const START_WAIT_MS: u64 = 3_000;

    /// How long a stop may take to release its port (milliseconds)
    pub const STOP_WAIT_MS: u64 = 3_000;

    /// How long force-restart waits for the port to free after a kill (milliseconds)
    pub const PORT_FREE_WAIT_MS: u64 = 5_000;

    /// Poll interval of the port-free wait (milliseconds)
    pub const PORT_FREE_POLL_MS: u64 = 100;

    /// Grace period between SIGTERM and SIGKILL (milliseconds)
    pub const KILL_GRACE_MS: u64 = 2_000;

    /// Overall deadline of one public lifecycle call (seconds)
    pub const OPERATION_DEADLINE_SEC: u64 = 60;
}

/// Batch orchestration defaults
pub mod batch {
    /// Maximum number of concurrently executing units
    pub const CONCURRENCY_CAP: usize = 5;

    /// Timeout of a single unit of work (seconds)
    pub const UNIT_TIMEOUT_SEC: u64 = 60;
}

/// Operation log pipeline defaults
pub mod log_pipeline {
    /// Capacity of the submission channel
    pub const CHANNEL_CAPACITY: usize = 1_000;

    /// Records per flush
    pub const BATCH_SIZE: usize = 50;

    /// Maximum time a record waits in a partial batch (milliseconds)
    pub const FLUSH_INTERVAL_MS: u64 = 5_000;

    /// Timeout of one batch write (milliseconds)
    pub const FLUSH_TIMEOUT_MS: u64 = 10_000;

    /// Timeout of the synchronous fallback write (milliseconds)
    pub const FALLBACK_TIMEOUT_MS: u64 = 5_000;

    /// Output bytes kept per record
    pub const MAX_OUTPUT_BYTES: usize = 10_000;

    /// Error-message bytes kept per record
    pub const MAX_ERROR_BYTES: usize = 5_000;

    /// Marker appended to truncated fields
    pub const TRUNCATION_MARKER: &str = "...[truncated]";

    /// Default retention when pruning old records (days)
    pub const DEFAULT_RETENTION_DAYS: u32 = 30;
}

/// Service definition defaults (informational, no crash-restart is enforced)
pub mod service {
    pub const DEFAULT_MAX_RESTART_COUNT: u32 = 3;
    pub const DEFAULT_RESTART_INTERVAL_SEC: u64 = 30;
}

/// Service listing defaults
pub mod catalog {
    pub const DEFAULT_PAGE: usize = 1;
    pub const DEFAULT_PAGE_SIZE: usize = 20;
}

/// Environment variables and paths
pub mod env {
    /// Overrides the configuration file path
    pub const CONFIG_VAR: &str = "SVCCTL_CONFIG";

    /// Log level, takes priority over RUST_LOG
    pub const LOG_LEVEL_VAR: &str = "SVCCTL_LOG_LEVEL";

    /// Overrides the JSON-lines operation log path
    pub const LOG_PATH_VAR: &str = "SVCCTL_LOG_PATH";

    pub const DEFAULT_CONFIG_PATH: &str = "/etc/svcctl/services.yaml";
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}
