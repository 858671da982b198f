//! Tokio Command Runner
//! Real implementation of the CommandRunner port using tokio::process
//!
//! - The child gets its own process group and a minimal environment
//! - stdout and stderr are captured into one interleaved buffer, capped at
//!   the request's output limit
//! - On timeout the direct child is killed; its output so far is kept

use crate::constants::command::{CHILD_PATH, OUTPUT_DRAIN_GRACE_MS, SHELL};
use crate::domain::ports::{CommandOutput, CommandRequest, CommandRunner, Invocation};
use crate::domain::value_objects::truncate_field;
use crate::domain::DomainError;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

pub struct TokioCommandRunner {
    shell: String,
    path: String,
    /// How long to keep reading output after the child exits. Daemonised
    /// grandchildren may hold the pipes open indefinitely.
    drain_grace: Duration,
}

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self {
            shell: SHELL.to_string(),
            path: CHILD_PATH.to_string(),
            drain_grace: Duration::from_millis(OUTPUT_DRAIN_GRACE_MS),
        }
    }

    fn build_command(&self, request: &CommandRequest) -> Command {
        let mut cmd = match &request.invocation {
            Invocation::Direct { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Invocation::Shell(line) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(line);
                cmd
            }
        };

        cmd.env_clear()
            .env("PATH", &self.path)
            .env("SHELL", &self.shell)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &request.work_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy `reader` into `buffer` until EOF. Past `limit` bytes (plus one, so
/// the overflow stays visible) the pipe is still drained but nothing is kept.
async fn pump<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>, limit: usize)
where
    R: AsyncRead + Unpin,
{
    let keep = limit.saturating_add(1);
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buffer = buffer.lock().await;
                let room = keep.saturating_sub(buffer.len()).min(n);
                buffer.extend_from_slice(&chunk[..room]);
            }
        }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput, DomainError> {
        let command_line = request.invocation.command_line();
        let mut child = self
            .build_command(&request)
            .spawn()
            .map_err(|e| DomainError::CommandFailed {
                message: format!("failed to spawn '{}': {}", command_line, e),
                exit_code: None,
                output: String::new(),
            })?;

        debug!(pid = ?child.id(), command = %command_line, "Command spawned");

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut readers = JoinSet::new();
        if let Some(stdout) = child.stdout.take() {
            readers.spawn(pump(stdout, Arc::clone(&buffer), request.output_limit));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.spawn(pump(stderr, Arc::clone(&buffer), request.output_limit));
        }

        let (exit_code, timed_out) = match timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                return Err(DomainError::CommandFailed {
                    message: format!("failed to wait for '{}': {}", command_line, e),
                    exit_code: None,
                    output: String::new(),
                })
            }
            Err(_) => {
                warn!(
                    pid = ?child.id(),
                    command = %command_line,
                    timeout_ms = request.timeout.as_millis() as u64,
                    "Command deadline reached, killing child"
                );
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "Failed to kill timed out child");
                }
                let _ = child.wait().await;
                (None, true)
            }
        };

        let drained = timeout(self.drain_grace, async {
            while readers.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            debug!(command = %command_line, "Output pipes still open after exit, detaching");
            readers.abort_all();
        }

        let output = truncate_field(
            String::from_utf8_lossy(&buffer.lock().await).into_owned(),
            request.output_limit,
        );
        Ok(CommandOutput {
            output,
            exit_code,
            timed_out,
        })
    }
}
