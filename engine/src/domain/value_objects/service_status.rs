//! ServiceStatus Value Object
//!
//! Live view of a service: its definition joined with the port snapshot.
//! Always recomputed, never stored.

use crate::domain::entities::ServiceDefinition;
use crate::domain::value_objects::PortSnapshot;
use serde::Serialize;
use std::fmt;

/// State observed through the service's port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Port is free
    Stopped,
    /// Port is held by a listener
    Running,
}

impl RunState {
    pub fn from_listening(listening: bool) -> Self {
        if listening {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub definition: ServiceDefinition,
    pub running: bool,
    pub pid: Option<u32>,
    pub process_name: Option<String>,
}

impl ServiceStatus {
    /// Join a definition with the owner of its port in `snapshot`
    pub fn from_snapshot(definition: ServiceDefinition, snapshot: &PortSnapshot) -> Self {
        match snapshot.owner(definition.port().value()) {
            Some(owner) => Self {
                pid: Some(owner.pid),
                process_name: Some(owner.process_name.clone()),
                running: true,
                definition,
            },
            None => Self {
                definition,
                running: false,
                pid: None,
                process_name: None,
            },
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_listening(self.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{Port, PortOwner};
    use std::collections::HashMap;

    #[test]
    fn test_join_with_snapshot() {
        let definition = ServiceDefinition::builder("web", Port::new(8080).unwrap(), "run")
            .work_dir("/tmp")
            .build()
            .unwrap();

        let mut owners = HashMap::new();
        owners.insert(8080, PortOwner::new(321, "python3"));
        let status = ServiceStatus::from_snapshot(definition.clone(), &PortSnapshot::new(owners));
        assert!(status.running);
        assert_eq!(status.pid, Some(321));
        assert_eq!(status.process_name.as_deref(), Some("python3"));
        assert_eq!(status.state(), RunState::Running);

        let status = ServiceStatus::from_snapshot(definition, &PortSnapshot::empty());
        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert_eq!(status.state(), RunState::Stopped);
    }
}
