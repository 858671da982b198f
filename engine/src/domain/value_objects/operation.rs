//! Operation Value Object
//!
//! The lifecycle operations a caller can apply to a service

use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Run the start command and wait for the port to be bound
    Start,

    /// Run the stop command (or kill the port owner) and wait for the port to free
    Stop,

    /// Run the restart command, or stop then start
    Restart,

    /// Kill whatever holds the port, then start
    ForceRestart,

    /// Terminate the port owner, escalating to SIGKILL
    Kill,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Start,
        Operation::Stop,
        Operation::Restart,
        Operation::ForceRestart,
        Operation::Kill,
    ];

    /// Parse an operation name as accepted by batch requests
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            "force_restart" | "force-restart" | "forcerestart" => Some(Self::ForceRestart),
            "kill" => Some(Self::Kill),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::ForceRestart => "force_restart",
            Self::Kill => "kill",
        }
    }

    /// True if the operation is expected to leave the port bound
    pub fn ends_running(&self) -> bool {
        matches!(self, Self::Start | Self::Restart | Self::ForceRestart)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::UnsupportedOperation(s.to_string()))
    }
}
