//! Command Executor Service
//!
//! Validates a command and its working directory, hands it to the
//! `CommandRunner` and turns the raw outcome into typed errors.

use crate::constants::log_pipeline::MAX_OUTPUT_BYTES;
use crate::domain::ports::{CommandRequest, CommandRunner};
use crate::domain::services::CommandPolicy;
use crate::domain::value_objects::truncate_field;
use crate::domain::{DomainError, RejectionReason};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CommandExecutor {
    policy: CommandPolicy,
    runner: Arc<dyn CommandRunner>,
    output_limit: usize,
}

impl CommandExecutor {
    pub fn new(policy: CommandPolicy, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            policy,
            runner,
            output_limit: MAX_OUTPUT_BYTES,
        }
    }

    /// Cap the output returned in results and errors at `bytes`
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Run `command` in `work_dir` (empty means inherit) bounded by `timeout`.
    /// Returns the combined output, capped at the output limit; failures keep
    /// the output in the error.
    pub async fn run(
        &self,
        command: &str,
        work_dir: &str,
        timeout: Duration,
    ) -> Result<String, DomainError> {
        // 1. Policy checks, nothing is spawned on rejection
        let invocation = self.policy.plan(command)?;
        let work_dir = validate_work_dir(work_dir).await?;

        debug!(
            command = %invocation.command_line(),
            work_dir = ?work_dir,
            timeout_ms = timeout.as_millis() as u64,
            "Executing command"
        );

        // 2. Spawn and wait
        let outcome = self
            .runner
            .run(CommandRequest {
                invocation,
                work_dir,
                timeout,
                output_limit: self.output_limit,
            })
            .await?;
        let output = truncate_field(outcome.output, self.output_limit);

        // 3. Map the outcome
        if outcome.timed_out {
            warn!(timeout_ms = timeout.as_millis() as u64, "Command timed out");
            return Err(DomainError::CommandTimeout { timeout, output });
        }
        match outcome.exit_code {
            Some(0) => Ok(output),
            Some(code) => Err(DomainError::CommandFailed {
                message: format!("exit status {}", code),
                exit_code: Some(code),
                output,
            }),
            None => Err(DomainError::CommandFailed {
                message: "terminated by signal".to_string(),
                exit_code: None,
                output,
            }),
        }
    }
}

async fn validate_work_dir(work_dir: &str) -> Result<Option<PathBuf>, DomainError> {
    let work_dir = work_dir.trim();
    if work_dir.is_empty() {
        return Ok(None);
    }
    match tokio::fs::metadata(work_dir).await {
        Ok(meta) if meta.is_dir() => Ok(Some(PathBuf::from(work_dir))),
        Ok(_) => Err(DomainError::rejected(RejectionReason::NotADirectory(
            work_dir.to_string(),
        ))),
        Err(_) => Err(DomainError::rejected(RejectionReason::MissingWorkDir(
            work_dir.to_string(),
        ))),
    }
}
