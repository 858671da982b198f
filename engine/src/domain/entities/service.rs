//! Service Entity
//!
//! A named local process reachable on one TCP port, together with the
//! commands that start, stop and restart it. Owned by the repository; the
//! controller only ever holds a per-operation copy.

use crate::constants::service::{DEFAULT_MAX_RESTART_COUNT, DEFAULT_RESTART_INTERVAL_SEC};
use crate::domain::value_objects::{Port, ServiceId};
use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    id: ServiceId,
    name: String,
    title: String,
    port: Port,
    work_dir: String,
    start_cmd: String,
    stop_cmd: Option<String>,
    restart_cmd: Option<String>,
    remark: String,

    // Informational only: nothing acts on these
    health_check_url: Option<String>,
    auto_restart: bool,
    max_restart_count: u32,
    restart_interval_sec: u64,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceDefinition {
    pub fn builder(name: impl Into<String>, port: Port, start_cmd: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name.into(), port, start_cmd.into())
    }

    /// Check the fields a definition must carry to be stored
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidService(
                "service name cannot be empty".to_string(),
            ));
        }
        if self.work_dir.trim().is_empty() {
            return Err(DomainError::InvalidService(format!(
                "service '{}' has no working directory",
                self.name
            )));
        }
        if self.start_cmd.trim().is_empty() {
            return Err(DomainError::InvalidService(format!(
                "service '{}' has no start command",
                self.name
            )));
        }
        Ok(())
    }

    // Getters

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn work_dir(&self) -> &str {
        &self.work_dir
    }

    /// Start command, `None` when blank
    pub fn start_cmd(&self) -> Option<&str> {
        non_blank(Some(&self.start_cmd))
    }

    /// Stop command, `None` when unset or blank
    pub fn stop_cmd(&self) -> Option<&str> {
        non_blank(self.stop_cmd.as_deref())
    }

    /// Restart command, `None` when unset or blank
    pub fn restart_cmd(&self) -> Option<&str> {
        non_blank(self.restart_cmd.as_deref())
    }

    pub fn remark(&self) -> &str {
        &self.remark
    }

    pub fn health_check_url(&self) -> Option<&str> {
        self.health_check_url.as_deref()
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn max_restart_count(&self) -> u32 {
        self.max_restart_count
    }

    pub fn restart_interval_sec(&self) -> u64 {
        self.restart_interval_sec
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators used by the repository

    pub fn assign_id(&mut self, id: ServiceId) {
        self.id = id;
    }

    /// Keep the creation time of the stored record and stamp the update
    pub fn touch(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = Utc::now();
    }
}

fn non_blank(cmd: Option<&str>) -> Option<&str> {
    cmd.filter(|c| !c.trim().is_empty())
}

/// Builder for [`ServiceDefinition`]
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    definition: ServiceDefinition,
}

impl ServiceBuilder {
    fn new(name: String, port: Port, start_cmd: String) -> Self {
        let now = Utc::now();
        Self {
            definition: ServiceDefinition {
                id: ServiceId::UNASSIGNED,
                name,
                title: String::new(),
                port,
                work_dir: String::new(),
                start_cmd,
                stop_cmd: None,
                restart_cmd: None,
                remark: String::new(),
                health_check_url: None,
                auto_restart: false,
                max_restart_count: DEFAULT_MAX_RESTART_COUNT,
                restart_interval_sec: DEFAULT_RESTART_INTERVAL_SEC,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn id(mut self, id: ServiceId) -> Self {
        self.definition.id = id;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.definition.title = title.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<String>) -> Self {
        self.definition.work_dir = dir.into();
        self
    }

    pub fn stop_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.definition.stop_cmd = Some(cmd.into());
        self
    }

    pub fn restart_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.definition.restart_cmd = Some(cmd.into());
        self
    }

    pub fn remark(mut self, remark: impl Into<String>) -> Self {
        self.definition.remark = remark.into();
        self
    }

    pub fn health_check_url(mut self, url: impl Into<String>) -> Self {
        self.definition.health_check_url = Some(url.into());
        self
    }

    pub fn auto_restart(mut self, enabled: bool) -> Self {
        self.definition.auto_restart = enabled;
        self
    }

    pub fn max_restart_count(mut self, count: u32) -> Self {
        self.definition.max_restart_count = count;
        self
    }

    pub fn restart_interval_sec(mut self, secs: u64) -> Self {
        self.definition.restart_interval_sec = secs;
        self
    }

    pub fn build(self) -> Result<ServiceDefinition, DomainError> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(p: u32) -> Port {
        Port::new(p).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let svc = ServiceDefinition::builder("web", port(8080), "python3 -m http.server 8080")
            .work_dir("/tmp")
            .build()
            .unwrap();

        assert_eq!(svc.id(), ServiceId::UNASSIGNED);
        assert_eq!(svc.name(), "web");
        assert_eq!(svc.port().value(), 8080);
        assert_eq!(svc.start_cmd(), Some("python3 -m http.server 8080"));
        assert_eq!(svc.stop_cmd(), None);
        assert_eq!(svc.restart_cmd(), None);
        assert!(!svc.auto_restart());
        assert_eq!(svc.max_restart_count(), DEFAULT_MAX_RESTART_COUNT);
        assert_eq!(svc.restart_interval_sec(), DEFAULT_RESTART_INTERVAL_SEC);
    }

    #[test]
    fn test_blank_commands_are_not_configured() {
        let svc = ServiceDefinition::builder("web", port(8080), "run")
            .work_dir("/tmp")
            .stop_cmd("   ")
            .restart_cmd("")
            .build()
            .unwrap();
        assert_eq!(svc.stop_cmd(), None);
        assert_eq!(svc.restart_cmd(), None);
    }

    #[test]
    fn test_validation() {
        let missing_name = ServiceDefinition::builder(" ", port(80), "run")
            .work_dir("/tmp")
            .build();
        assert!(matches!(missing_name, Err(DomainError::InvalidService(_))));

        let missing_dir = ServiceDefinition::builder("web", port(80), "run").build();
        assert!(matches!(missing_dir, Err(DomainError::InvalidService(_))));

        let missing_start = ServiceDefinition::builder("web", port(80), "")
            .work_dir("/tmp")
            .build();
        assert!(matches!(missing_start, Err(DomainError::InvalidService(_))));
    }
}
