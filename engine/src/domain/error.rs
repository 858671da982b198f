//! Domain-level errors
//! Every failure surfaced by the controller carries a machine-readable kind,
//! a business code and, where a command ran, the output it produced.

use std::time::Duration;
use thiserror::Error;

/// Why the command policy refused a command before anything was spawned
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("command is empty")]
    Empty,

    #[error("command is longer than {max} bytes")]
    TooLong { max: usize },

    #[error("command contains forbidden character '{0}'")]
    Metacharacter(char),

    #[error("command invokes dangerous program '{0}'")]
    DangerousProgram(String),

    #[error("command contains a path traversal sequence")]
    PathTraversal,

    #[error("command references sensitive path '{0}'")]
    SensitivePath(String),

    #[error("working directory '{0}' does not exist")]
    MissingWorkDir(String),

    #[error("working directory '{0}' is not a directory")]
    NotADirectory(String),
}

#[derive(Debug, Error, Clone)]
pub enum DomainError {
    // Validation errors
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Command rejected: {reason}")]
    CommandRejected { reason: RejectionReason },

    #[error("Invalid service definition: {0}")]
    InvalidService(String),

    #[error("Unsupported operation '{0}'")]
    UnsupportedOperation(String),

    // Execution errors
    #[error("Command failed: {message}")]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Command timed out after {timeout:?}")]
    CommandTimeout { timeout: Duration, output: String },

    #[error("Service did not start listening within the wait window")]
    StartTimeout { output: String },

    #[error("Service did not release its port within the wait window")]
    StopTimeout { output: String },

    #[error("Operation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    // State conflicts
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Service '{0}' is already running")]
    ServiceAlreadyRunning(String),

    #[error("Service '{0}' is not running")]
    ServiceNotRunning(String),

    #[error("Service '{service}' has no {command} command configured")]
    CommandNotConfigured { service: String, command: String },

    #[error("Service name '{0}' is already taken")]
    DuplicateName(String),

    #[error("Port {0} is already assigned to another service")]
    DuplicatePort(u16),

    // Process control errors
    #[error("Refusing to kill pid {pid}: {reason}")]
    KillRefused { pid: u32, reason: String },

    #[error("No process owns port {0}")]
    PortNotOwned(u16),

    #[error("Port scan failed: {0}")]
    PortScanFailed(String),

    // Storage errors
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Log store error: {0}")]
    LogStore(String),
}

/// Business codes shared with the HTTP layer
pub mod codes {
    pub const INVALID_PARAM: u32 = 1001;
    pub const NOT_FOUND: u32 = 1002;
    pub const PORT_IN_USE: u32 = 1003;
    pub const SERVICE_RUNNING: u32 = 1004;
    pub const SERVICE_STOPPED: u32 = 1005;
    pub const COMMAND_FAILED: u32 = 1006;
    pub const STORAGE_ERROR: u32 = 1007;
    pub const PERMISSION_DENIED: u32 = 1008;
}

impl DomainError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::InvalidPort(_) => "invalid_port",
            DomainError::CommandRejected { .. } => "command_rejected",
            DomainError::InvalidService(_) => "invalid_service",
            DomainError::UnsupportedOperation(_) => "unsupported_operation",
            DomainError::CommandFailed { .. } => "command_failed",
            DomainError::CommandTimeout { .. } => "command_timeout",
            DomainError::StartTimeout { .. } => "start_timeout",
            DomainError::StopTimeout { .. } => "stop_timeout",
            DomainError::DeadlineExceeded(_) => "deadline_exceeded",
            DomainError::ServiceNotFound(_) => "service_not_found",
            DomainError::ServiceAlreadyRunning(_) => "service_already_running",
            DomainError::ServiceNotRunning(_) => "service_not_running",
            DomainError::CommandNotConfigured { .. } => "command_not_configured",
            DomainError::DuplicateName(_) => "duplicate_name",
            DomainError::DuplicatePort(_) => "duplicate_port",
            DomainError::KillRefused { .. } => "kill_refused",
            DomainError::PortNotOwned(_) => "port_not_owned",
            DomainError::PortScanFailed(_) => "port_scan_failed",
            DomainError::Repository(_) => "repository",
            DomainError::LogStore(_) => "log_store",
        }
    }

    /// Business code of the error
    pub fn code(&self) -> u32 {
        match self {
            DomainError::InvalidPort(_)
            | DomainError::CommandRejected { .. }
            | DomainError::InvalidService(_)
            | DomainError::UnsupportedOperation(_)
            | DomainError::CommandNotConfigured { .. }
            | DomainError::DuplicateName(_) => codes::INVALID_PARAM,
            DomainError::ServiceNotFound(_) | DomainError::PortNotOwned(_) => codes::NOT_FOUND,
            DomainError::DuplicatePort(_) => codes::PORT_IN_USE,
            DomainError::ServiceAlreadyRunning(_) => codes::SERVICE_RUNNING,
            DomainError::ServiceNotRunning(_) => codes::SERVICE_STOPPED,
            DomainError::CommandFailed { .. }
            | DomainError::CommandTimeout { .. }
            | DomainError::StartTimeout { .. }
            | DomainError::StopTimeout { .. }
            | DomainError::DeadlineExceeded(_)
            | DomainError::PortScanFailed(_) => codes::COMMAND_FAILED,
            DomainError::Repository(_) | DomainError::LogStore(_) => codes::STORAGE_ERROR,
            DomainError::KillRefused { .. } => codes::PERMISSION_DENIED,
        }
    }

    /// Command output preserved for diagnosis, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            DomainError::CommandFailed { output, .. }
            | DomainError::CommandTimeout { output, .. }
            | DomainError::StartTimeout { output }
            | DomainError::StopTimeout { output } => Some(output.as_str()),
            _ => None,
        }
    }

    /// Shorthand for a policy rejection
    pub fn rejected(reason: RejectionReason) -> Self {
        DomainError::CommandRejected { reason }
    }

    /// Same error with `prefix` prepended to its preserved output
    pub(crate) fn with_output_prefix(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        let join = |output: String| {
            if output.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}\n{output}")
            }
        };
        match self {
            DomainError::CommandFailed {
                message,
                exit_code,
                output,
            } => DomainError::CommandFailed {
                message,
                exit_code,
                output: join(output),
            },
            DomainError::CommandTimeout { timeout, output } => DomainError::CommandTimeout {
                timeout,
                output: join(output),
            },
            DomainError::StartTimeout { output } => DomainError::StartTimeout {
                output: join(output),
            },
            DomainError::StopTimeout { output } => DomainError::StopTimeout {
                output: join(output),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_code() {
        let err = DomainError::ServiceNotRunning("web".to_string());
        assert_eq!(err.kind(), "service_not_running");
        assert_eq!(err.code(), codes::SERVICE_STOPPED);

        let err = DomainError::rejected(RejectionReason::PathTraversal);
        assert_eq!(err.kind(), "command_rejected");
        assert_eq!(err.code(), codes::INVALID_PARAM);
        assert_eq!(
            err.to_string(),
            "Command rejected: command contains a path traversal sequence"
        );
    }

    #[test]
    fn test_output_is_preserved() {
        let err = DomainError::StartTimeout {
            output: "listening soon".to_string(),
        };
        assert_eq!(err.output(), Some("listening soon"));
        assert_eq!(DomainError::PortNotOwned(80).output(), None);
    }

    #[test]
    fn test_output_prefix() {
        let err = DomainError::CommandFailed {
            message: "exit status 1".to_string(),
            exit_code: Some(1),
            output: "boom".to_string(),
        }
        .with_output_prefix("killed pid 42");
        assert_eq!(err.output(), Some("killed pid 42\nboom"));

        let err = DomainError::ServiceNotFound("7".to_string()).with_output_prefix("ignored");
        assert!(matches!(err, DomainError::ServiceNotFound(_)));
    }
}
