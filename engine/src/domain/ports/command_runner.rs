//! CommandRunner port
//! Runs an already validated command. Policy lives in the domain; the
//! adapter only spawns, captures output and enforces the timeout.

use crate::domain::DomainError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// How the command line is handed to the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `program args...` executed without a shell
    Direct { program: String, args: Vec<String> },
    /// Whole line passed to `bash -c`
    Shell(String),
}

impl Invocation {
    pub fn command_line(&self) -> String {
        match self {
            Invocation::Direct { program, args } if args.is_empty() => program.clone(),
            Invocation::Direct { program, args } => format!("{} {}", program, args.join(" ")),
            Invocation::Shell(line) => line.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub invocation: Invocation,
    pub work_dir: Option<PathBuf>,
    pub timeout: Duration,
    /// Output bytes worth keeping; the rest is read and discarded
    pub output_limit: usize,
}

/// What the child produced before it exited or was killed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Interleaved stdout and stderr
    pub output: String,
    /// Exit code, `None` if killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Spawn the command and wait for it or its timeout.
    /// Only spawn failures are errors; exit status is reported in the output.
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput, DomainError>;
}
