//! Port Owner Termination
//!
//! Kills whatever process listens on a port: SIGTERM, poll for the port to
//! free during the grace period, then SIGKILL. Never signals pid 1 or the
//! controller itself.

use crate::domain::ports::{ProcessSignaller, Signal};
use crate::domain::services::PortMonitor;
use crate::domain::value_objects::{Port, PortOwner, RunState};
use crate::domain::DomainError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What a termination did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub port: Port,
    pub owner: PortOwner,
    /// SIGKILL was needed after the grace period
    pub escalated: bool,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent {} to pid {} ({}) on port {}",
            Signal::Terminate,
            self.owner.pid,
            self.owner.process_name,
            self.port
        )?;
        if self.escalated {
            write!(f, ", escalated to {}", Signal::Kill)?;
        }
        Ok(())
    }
}

pub struct PortOwnerTerminator {
    monitor: Arc<PortMonitor>,
    signaller: Arc<dyn ProcessSignaller>,
    grace: Duration,
    poll: Duration,
}

impl PortOwnerTerminator {
    pub fn new(
        monitor: Arc<PortMonitor>,
        signaller: Arc<dyn ProcessSignaller>,
        grace: Duration,
        poll: Duration,
    ) -> Self {
        Self {
            monitor,
            signaller,
            grace,
            poll,
        }
    }

    pub async fn terminate(&self, port: Port) -> Result<Termination, DomainError> {
        // 1. Resolve the owner from a fresh scan
        let owner = self
            .monitor
            .owner_of(port)
            .await?
            .ok_or(DomainError::PortNotOwned(port.value()))?;

        // 2. Refuse to harm init or ourselves
        if owner.pid == 0 {
            return Err(DomainError::KillRefused {
                pid: owner.pid,
                reason: "owner of the port is unknown".to_string(),
            });
        }
        if owner.pid == 1 {
            return Err(DomainError::KillRefused {
                pid: owner.pid,
                reason: "pid 1 is the init process".to_string(),
            });
        }
        if owner.pid == self.signaller.current_pid() {
            return Err(DomainError::KillRefused {
                pid: owner.pid,
                reason: "it is the controlling process".to_string(),
            });
        }

        // 3. Graceful terminate, then wait for the port to free
        info!(
            port = port.value(),
            pid = owner.pid,
            process = %owner.process_name,
            "Terminating port owner"
        );
        self.signaller.signal(owner.pid, Signal::Terminate).await?;
        let released = self
            .monitor
            .wait_for_state(port, RunState::Stopped, self.grace, self.poll)
            .await;

        // 4. Escalate
        if !released {
            warn!(
                port = port.value(),
                pid = owner.pid,
                grace_ms = self.grace.as_millis() as u64,
                "Port still bound after grace period, sending SIGKILL"
            );
            self.signaller.signal(owner.pid, Signal::Kill).await?;
        }

        self.monitor.invalidate_cache().await;

        Ok(Termination {
            port,
            owner,
            escalated: !released,
        })
    }
}
