//! Configuration loading from YAML
//!
//! One file holds the engine tunables, the log pipeline settings and the
//! service definitions seeded into the repository:
//!
//! ```yaml
//! engine:
//!   command_timeout_sec: 10
//!   batch_concurrency: 3
//! log_pipeline:
//!   log_path: /var/log/svcctl/operations.jsonl
//! services:
//!   - name: order-api
//!     port: 8080
//!     work_dir: /opt/order-api
//!     start_cmd: ./bin/start.sh
//!     stop_cmd: ./bin/stop.sh
//! ```
//!
//! Every tunable is optional; anything omitted keeps its default.

use crate::constants::env::{CONFIG_VAR, DEFAULT_CONFIG_PATH, LOG_PATH_VAR};
use crate::constants::log_pipeline::DEFAULT_RETENTION_DAYS;
use crate::constants::service::{DEFAULT_MAX_RESTART_COUNT, DEFAULT_RESTART_INTERVAL_SEC};
use crate::domain::entities::ServiceDefinition;
use crate::domain::value_objects::{ControllerSettings, PipelineSettings, Port, ServiceId};
use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Top-level configuration structure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub log_pipeline: LogPipelineConfig,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// Controller tunables
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub snapshot_ttl_ms: Option<u64>,

    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    #[serde(default)]
    pub command_timeout_sec: Option<u64>,

    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    #[serde(default)]
    pub start_wait_ms: Option<u64>,

    #[serde(default)]
    pub stop_wait_ms: Option<u64>,

    #[serde(default)]
    pub port_free_wait_ms: Option<u64>,

    #[serde(default)]
    pub kill_grace_ms: Option<u64>,

    #[serde(default)]
    pub operation_deadline_sec: Option<u64>,

    #[serde(default)]
    pub batch_concurrency: Option<usize>,

    #[serde(default)]
    pub batch_unit_timeout_sec: Option<u64>,

    /// Cap on command output returned to callers and kept in operation records
    #[serde(default)]
    pub max_output_bytes: Option<usize>,

    /// Run commands with `&&`, `||`, `;` or `|` through bash
    #[serde(default)]
    pub allow_shell_operators: Option<bool>,
}

/// Operation log pipeline settings
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogPipelineConfig {
    #[serde(default)]
    pub channel_capacity: Option<usize>,

    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default)]
    pub flush_interval_ms: Option<u64>,

    #[serde(default)]
    pub flush_timeout_ms: Option<u64>,

    #[serde(default)]
    pub fallback_timeout_ms: Option<u64>,

    #[serde(default)]
    pub max_error_bytes: Option<usize>,

    /// JSON-lines file; records stay in memory when unset
    #[serde(default)]
    pub log_path: Option<String>,

    #[serde(default)]
    pub retention_days: Option<u32>,
}

/// One service definition from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub id: Option<i64>,

    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    pub port: u32,

    pub work_dir: String,

    pub start_cmd: String,

    #[serde(default)]
    pub stop_cmd: Option<String>,

    #[serde(default)]
    pub restart_cmd: Option<String>,

    #[serde(default)]
    pub remark: Option<String>,

    #[serde(default)]
    pub health_check_url: Option<String>,

    #[serde(default)]
    pub auto_restart: bool,

    #[serde(default = "default_max_restart_count")]
    pub max_restart_count: u32,

    #[serde(default = "default_restart_interval_sec")]
    pub restart_interval_sec: u64,
}

fn default_max_restart_count() -> u32 {
    DEFAULT_MAX_RESTART_COUNT
}

fn default_restart_interval_sec() -> u64 {
    DEFAULT_RESTART_INTERVAL_SEC
}

impl ServiceConfig {
    pub fn to_definition(&self) -> Result<ServiceDefinition, DomainError> {
        let port = Port::new(self.port)?;
        let mut builder = ServiceDefinition::builder(&self.name, port, &self.start_cmd)
            .work_dir(&self.work_dir)
            .auto_restart(self.auto_restart)
            .max_restart_count(self.max_restart_count)
            .restart_interval_sec(self.restart_interval_sec);

        if let Some(id) = self.id {
            builder = builder.id(ServiceId::new(id));
        }
        if let Some(title) = &self.title {
            builder = builder.title(title);
        }
        if let Some(cmd) = &self.stop_cmd {
            builder = builder.stop_cmd(cmd);
        }
        if let Some(cmd) = &self.restart_cmd {
            builder = builder.restart_cmd(cmd);
        }
        if let Some(remark) = &self.remark {
            builder = builder.remark(remark);
        }
        if let Some(url) = &self.health_check_url {
            builder = builder.health_check_url(url);
        }
        builder.build()
    }
}

fn ms(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_yaml(&contents)
            .map_err(|e| format!("Invalid config file '{}': {}", path.display(), e))
    }

    pub fn from_yaml(contents: &str) -> Result<Self, String> {
        let config: Config =
            serde_yaml::from_str(contents).map_err(|e| format!("Failed to parse YAML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Catch duplicates and unusable zero settings early, naming the offending entry
    fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(format!(
                    "Duplicate service name '{}' in configuration",
                    service.name
                ));
            }
            if !ports.insert(service.port) {
                return Err(format!(
                    "Port {} is assigned to more than one service ('{}')",
                    service.port, service.name
                ));
            }
        }
        if self.engine.batch_concurrency == Some(0) {
            return Err("engine.batch_concurrency must be at least 1".to_string());
        }
        if self.log_pipeline.batch_size == Some(0) || self.log_pipeline.channel_capacity == Some(0)
        {
            return Err("log_pipeline sizes must be at least 1".to_string());
        }

        let e = &self.engine;
        let p = &self.log_pipeline;
        let non_zero = [
            ("engine.probe_timeout_ms", e.probe_timeout_ms),
            ("engine.command_timeout_sec", e.command_timeout_sec),
            ("engine.poll_interval_ms", e.poll_interval_ms),
            ("engine.operation_deadline_sec", e.operation_deadline_sec),
            ("log_pipeline.flush_interval_ms", p.flush_interval_ms),
            ("log_pipeline.flush_timeout_ms", p.flush_timeout_ms),
            ("log_pipeline.fallback_timeout_ms", p.fallback_timeout_ms),
        ];
        if let Some((key, _)) = non_zero.iter().find(|(_, value)| *value == Some(0)) {
            return Err(format!("{} must be greater than zero", key));
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let d = ControllerSettings::default();
        let e = &self.engine;
        ControllerSettings {
            snapshot_ttl: ms(e.snapshot_ttl_ms, d.snapshot_ttl),
            probe_timeout: ms(e.probe_timeout_ms, d.probe_timeout),
            command_timeout: secs(e.command_timeout_sec, d.command_timeout),
            poll_interval: ms(e.poll_interval_ms, d.poll_interval),
            start_wait: ms(e.start_wait_ms, d.start_wait),
            stop_wait: ms(e.stop_wait_ms, d.stop_wait),
            port_free_wait: ms(e.port_free_wait_ms, d.port_free_wait),
            port_free_poll: d.port_free_poll,
            kill_grace: ms(e.kill_grace_ms, d.kill_grace),
            operation_deadline: secs(e.operation_deadline_sec, d.operation_deadline),
            batch_concurrency: e.batch_concurrency.unwrap_or(d.batch_concurrency),
            batch_unit_timeout: secs(e.batch_unit_timeout_sec, d.batch_unit_timeout),
            allow_shell_operators: e.allow_shell_operators.unwrap_or(d.allow_shell_operators),
            max_output_bytes: e.max_output_bytes.unwrap_or(d.max_output_bytes),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let d = PipelineSettings::default();
        let p = &self.log_pipeline;
        PipelineSettings {
            channel_capacity: p.channel_capacity.unwrap_or(d.channel_capacity),
            batch_size: p.batch_size.unwrap_or(d.batch_size),
            flush_interval: ms(p.flush_interval_ms, d.flush_interval),
            flush_timeout: ms(p.flush_timeout_ms, d.flush_timeout),
            fallback_timeout: ms(p.fallback_timeout_ms, d.fallback_timeout),
            max_output_bytes: self.engine.max_output_bytes.unwrap_or(d.max_output_bytes),
            max_error_bytes: p.max_error_bytes.unwrap_or(d.max_error_bytes),
        }
    }

    /// Operation log file: `SVCCTL_LOG_PATH` wins over the file setting
    pub fn log_path(&self) -> Option<PathBuf> {
        env::var(LOG_PATH_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.log_pipeline.log_path.clone())
            .map(PathBuf::from)
    }

    pub fn retention_days(&self) -> u32 {
        self.log_pipeline
            .retention_days
            .unwrap_or(DEFAULT_RETENTION_DAYS)
    }

    pub fn service_definitions(&self) -> Result<Vec<ServiceDefinition>, DomainError> {
        self.services.iter().map(ServiceConfig::to_definition).collect()
    }
}

/// Where the configuration comes from and whether the user asked for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    /// Named by `--config` or `SVCCTL_CONFIG`; a missing file is then an error
    pub explicit: bool,
}

impl ConfigLocation {
    /// Priority: command-line flag > `SVCCTL_CONFIG` > default path
    pub fn resolve(cli_path: Option<&str>) -> Self {
        if let Some(path) = cli_path.filter(|p| !p.trim().is_empty()) {
            return Self {
                path: PathBuf::from(path),
                explicit: true,
            };
        }
        match env::var(CONFIG_VAR) {
            Ok(path) if !path.trim().is_empty() => Self {
                path: PathBuf::from(path),
                explicit: true,
            },
            _ => Self {
                path: PathBuf::from(DEFAULT_CONFIG_PATH),
                explicit: false,
            },
        }
    }

    /// Load the file; an absent default file yields the default configuration
    pub fn load(&self) -> Result<Config, String> {
        if !self.explicit && !self.path.exists() {
            info!(
                path = %self.path.display(),
                "No configuration file, using defaults"
            );
            return Ok(Config::default());
        }
        Config::load(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SAMPLE: &str = r#"
engine:
  command_timeout_sec: 9
  poll_interval_ms: 250
  batch_concurrency: 2
  allow_shell_operators: true
log_pipeline:
  batch_size: 10
  log_path: /tmp/ops.jsonl
services:
  - name: order-api
    port: 8080
    work_dir: /opt/order-api
    start_cmd: ./bin/start.sh
    stop_cmd: ./bin/stop.sh
  - id: 7
    name: billing
    port: 8081
    work_dir: /opt/billing
    start_cmd: ./run.sh
    auto_restart: true
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        let settings = config.controller_settings();
        assert_eq!(settings.command_timeout, Duration::from_secs(9));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.batch_concurrency, 2);
        assert!(settings.allow_shell_operators);
        // Untouched values keep their defaults
        assert_eq!(settings.kill_grace, ControllerSettings::default().kill_grace);
        assert_eq!(settings.max_output_bytes, 10_000);

        let capped = Config::from_yaml("engine:\n  max_output_bytes: 64\n").unwrap();
        assert_eq!(capped.controller_settings().max_output_bytes, 64);
        assert_eq!(capped.pipeline_settings().max_output_bytes, 64);

        let pipeline = config.pipeline_settings();
        assert_eq!(pipeline.batch_size, 10);
        assert_eq!(
            pipeline.channel_capacity,
            PipelineSettings::default().channel_capacity
        );

        let definitions = config.service_definitions().unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].stop_cmd(), Some("./bin/stop.sh"));
        assert_eq!(definitions[1].id(), ServiceId::new(7));
        assert!(definitions[1].auto_restart());
        assert_eq!(definitions[1].max_restart_count(), DEFAULT_MAX_RESTART_COUNT);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.services.is_empty());
        assert!(!config.controller_settings().allow_shell_operators);
    }

    #[test]
    fn test_duplicates_rejected() {
        let yaml = r#"
services:
  - { name: a, port: 8080, work_dir: /a, start_cmd: run }
  - { name: a, port: 8081, work_dir: /b, start_cmd: run }
"#;
        assert!(Config::from_yaml(yaml).unwrap_err().contains("Duplicate service name"));

        let yaml = r#"
services:
  - { name: a, port: 8080, work_dir: /a, start_cmd: run }
  - { name: b, port: 8080, work_dir: /b, start_cmd: run }
"#;
        assert!(Config::from_yaml(yaml).unwrap_err().contains("Port 8080"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        for (yaml, key) in [
            ("log_pipeline:\n  flush_interval_ms: 0\n", "log_pipeline.flush_interval_ms"),
            ("log_pipeline:\n  flush_timeout_ms: 0\n", "log_pipeline.flush_timeout_ms"),
            ("log_pipeline:\n  fallback_timeout_ms: 0\n", "log_pipeline.fallback_timeout_ms"),
            ("engine:\n  poll_interval_ms: 0\n", "engine.poll_interval_ms"),
            ("engine:\n  probe_timeout_ms: 0\n", "engine.probe_timeout_ms"),
            ("engine:\n  command_timeout_sec: 0\n", "engine.command_timeout_sec"),
            ("engine:\n  operation_deadline_sec: 0\n", "engine.operation_deadline_sec"),
        ] {
            let err = Config::from_yaml(yaml).unwrap_err();
            assert!(err.contains(key), "{} -> {}", yaml, err);
        }

        let config = Config::from_yaml("log_pipeline:\n  flush_interval_ms: 1\n").unwrap();
        assert_eq!(config.pipeline_settings().flush_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_unknown_engine_key_rejected() {
        assert!(Config::from_yaml("engine:\n  comand_timeout_sec: 3\n").is_err());
    }

    #[test]
    fn test_invalid_port_in_service() {
        let yaml = "services:\n  - { name: a, port: 70000, work_dir: /a, start_cmd: run }\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.service_definitions(),
            Err(DomainError::InvalidPort(_))
        ));
    }

    #[test]
    #[serial]
    fn test_location_priority() {
        env::remove_var(CONFIG_VAR);
        let default = ConfigLocation::resolve(None);
        assert_eq!(default.path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!default.explicit);

        env::set_var(CONFIG_VAR, "/tmp/from-env.yaml");
        assert_eq!(
            ConfigLocation::resolve(None).path,
            PathBuf::from("/tmp/from-env.yaml")
        );
        assert_eq!(
            ConfigLocation::resolve(Some("/tmp/flag.yaml")).path,
            PathBuf::from("/tmp/flag.yaml")
        );
        env::remove_var(CONFIG_VAR);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");

        let explicit = ConfigLocation {
            path: missing.clone(),
            explicit: true,
        };
        assert!(explicit.load().is_err());

        let implicit = ConfigLocation {
            path: missing,
            explicit: false,
        };
        assert!(implicit.load().unwrap().services.is_empty());
    }

    #[test]
    #[serial]
    fn test_log_path_env_override() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        env::remove_var(LOG_PATH_VAR);
        assert_eq!(config.log_path(), Some(PathBuf::from("/tmp/ops.jsonl")));

        env::set_var(LOG_PATH_VAR, "/var/tmp/other.jsonl");
        assert_eq!(config.log_path(), Some(PathBuf::from("/var/tmp/other.jsonl")));
        env::remove_var(LOG_PATH_VAR);
    }
}
