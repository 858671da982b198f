//! Lifecycle policies
//!
//! Each operation either runs an explicit command from the definition or
//! falls back to acting on the port owner. The choice is made once here so
//! Start/Stop/Restart/ForceRestart stay consistent.

use crate::domain::entities::ServiceDefinition;
use crate::domain::DomainError;

/// How a running service is brought down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopStrategy {
    /// Run the configured stop command
    ExplicitCommand(String),
    /// Terminate whatever process holds the port
    KillPortOwner,
}

/// How a running service is restarted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Run the configured restart command
    ExplicitCommand(String),
    /// Stop with the stop strategy, then run the start command
    StopThenStart,
}

/// Policies selected for one service definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub start: Option<String>,
    pub stop: StopStrategy,
    pub restart: RestartStrategy,
}

impl LifecyclePolicy {
    pub fn for_service(definition: &ServiceDefinition) -> Self {
        Self {
            start: definition.start_cmd().map(str::to_string),
            stop: match definition.stop_cmd() {
                Some(cmd) => StopStrategy::ExplicitCommand(cmd.to_string()),
                None => StopStrategy::KillPortOwner,
            },
            restart: match definition.restart_cmd() {
                Some(cmd) => RestartStrategy::ExplicitCommand(cmd.to_string()),
                None => RestartStrategy::StopThenStart,
            },
        }
    }

    /// Start command, or `CommandNotConfigured`
    pub fn start_command(&self, service: &str) -> Result<&str, DomainError> {
        self.start
            .as_deref()
            .ok_or_else(|| DomainError::CommandNotConfigured {
                service: service.to_string(),
                command: "start".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Port;

    fn builder() -> crate::domain::entities::ServiceBuilder {
        ServiceDefinition::builder("api", Port::new(9000).unwrap(), "./api serve").work_dir("/srv/api")
    }

    #[test]
    fn test_defaults_fall_back_to_port_owner() {
        let policy = LifecyclePolicy::for_service(&builder().build().unwrap());
        assert_eq!(policy.start.as_deref(), Some("./api serve"));
        assert_eq!(policy.stop, StopStrategy::KillPortOwner);
        assert_eq!(policy.restart, RestartStrategy::StopThenStart);
    }

    #[test]
    fn test_explicit_commands_win() {
        let definition = builder()
            .stop_cmd("./api shutdown")
            .restart_cmd("./api reload")
            .build()
            .unwrap();
        let policy = LifecyclePolicy::for_service(&definition);
        assert_eq!(
            policy.stop,
            StopStrategy::ExplicitCommand("./api shutdown".to_string())
        );
        assert_eq!(
            policy.restart,
            RestartStrategy::ExplicitCommand("./api reload".to_string())
        );
    }

    #[test]
    fn test_missing_start_command() {
        let policy = LifecyclePolicy {
            start: None,
            stop: StopStrategy::KillPortOwner,
            restart: RestartStrategy::StopThenStart,
        };
        assert!(matches!(
            policy.start_command("api"),
            Err(DomainError::CommandNotConfigured { .. })
        ));
    }
}
