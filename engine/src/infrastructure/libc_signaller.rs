//! Libc Process Signaller
//! Delivers SIGTERM/SIGKILL with `kill(2)`

use crate::domain::ports::{ProcessSignaller, Signal};
use crate::domain::DomainError;
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct LibcSignaller;

impl LibcSignaller {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
fn signal_number(signal: Signal) -> libc::c_int {
    match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    }
}

#[async_trait]
impl ProcessSignaller for LibcSignaller {
    async fn signal(&self, pid: u32, signal: Signal) -> Result<(), DomainError> {
        info!(pid = pid, signal = %signal, "Signalling process");

        #[cfg(unix)]
        {
            let raw = libc::pid_t::try_from(pid).map_err(|_| DomainError::KillRefused {
                pid,
                reason: "pid out of range".to_string(),
            })?;
            if raw <= 0 {
                return Err(DomainError::KillRefused {
                    pid,
                    reason: "not a single process id".to_string(),
                });
            }

            let result = unsafe { libc::kill(raw, signal_number(signal)) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ESRCH) {
                    debug!(pid = pid, "Process already gone");
                    return Ok(());
                }
                warn!(pid = pid, signal = %signal, error = %err, "Failed to send signal");
                return Err(DomainError::KillRefused {
                    pid,
                    reason: err.to_string(),
                });
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            Err(DomainError::KillRefused {
                pid,
                reason: format!("{} is not supported on this platform", signal),
            })
        }
    }

    fn current_pid(&self) -> u32 {
        std::process::id()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminate_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        LibcSignaller::new()
            .signal(pid, Signal::Terminate)
            .await
            .unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_gone_process_is_not_an_error() {
        // Above any pid_max the kernel allows
        LibcSignaller::new()
            .signal(2_000_000_000, Signal::Kill)
            .await
            .unwrap();
    }

    #[test]
    fn test_current_pid() {
        assert_eq!(LibcSignaller::new().current_pid(), std::process::id());
    }
}
