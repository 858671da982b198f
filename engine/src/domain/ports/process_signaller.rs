//! ProcessSignaller port

use crate::domain::DomainError;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Kill => write!(f, "SIGKILL"),
        }
    }
}

#[async_trait]
pub trait ProcessSignaller: Send + Sync {
    /// Deliver `signal` to `pid`. A process that is already gone is not an error.
    async fn signal(&self, pid: u32, signal: Signal) -> Result<(), DomainError>;

    /// Pid of the controlling process, which must never be signalled
    fn current_pid(&self) -> u32;
}
