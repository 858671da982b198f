//! Process Controller
//!
//! State transitions of a single service: Start, Stop, Restart,
//! ForceRestart and Kill. State is observed through the service's port;
//! every transition waits for the expected state before reporting success.
//!
//! All transitions share one mutex so concurrent wait loops never observe
//! each other's half-finished work. Each public call, whatever its outcome,
//! hands exactly one `OperationRecord` to the log pipeline.

use crate::domain::entities::ServiceDefinition;
use crate::domain::ports::ServiceRepository;
use crate::domain::services::{
    CommandExecutor, OperationLogPipeline, PortMonitor, PortOwnerTerminator,
};
use crate::domain::value_objects::{
    ControllerSettings, LifecyclePolicy, Operation, OperationRecord, RestartStrategy, RunState,
    ServiceId, StopStrategy,
};
use crate::domain::DomainError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Something that can apply a lifecycle operation to a service within a deadline
#[async_trait]
pub trait LifecycleOperator: Send + Sync {
    async fn execute(
        &self,
        operation: Operation,
        service_id: ServiceId,
        deadline: Duration,
    ) -> Result<String, DomainError>;
}

pub struct ProcessController {
    repository: Arc<dyn ServiceRepository>,
    monitor: Arc<PortMonitor>,
    executor: Arc<CommandExecutor>,
    terminator: PortOwnerTerminator,
    pipeline: Arc<OperationLogPipeline>,
    settings: ControllerSettings,
    transitions: Mutex<()>,
}

impl ProcessController {
    pub fn new(
        repository: Arc<dyn ServiceRepository>,
        monitor: Arc<PortMonitor>,
        executor: Arc<CommandExecutor>,
        terminator: PortOwnerTerminator,
        pipeline: Arc<OperationLogPipeline>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            repository,
            monitor,
            executor,
            terminator,
            pipeline,
            settings,
            transitions: Mutex::new(()),
        }
    }

    pub async fn start(&self, id: ServiceId) -> Result<String, DomainError> {
        self.run(Operation::Start, id, self.settings.operation_deadline)
            .await
    }

    pub async fn stop(&self, id: ServiceId) -> Result<String, DomainError> {
        self.run(Operation::Stop, id, self.settings.operation_deadline)
            .await
    }

    pub async fn restart(&self, id: ServiceId) -> Result<String, DomainError> {
        self.run(Operation::Restart, id, self.settings.operation_deadline)
            .await
    }

    pub async fn force_restart(&self, id: ServiceId) -> Result<String, DomainError> {
        self.run(Operation::ForceRestart, id, self.settings.operation_deadline)
            .await
    }

    pub async fn kill(&self, id: ServiceId) -> Result<String, DomainError> {
        self.run(Operation::Kill, id, self.settings.operation_deadline)
            .await
    }

    /// Apply `operation` under `deadline` and record the outcome
    pub async fn run(
        &self,
        operation: Operation,
        id: ServiceId,
        deadline: Duration,
    ) -> Result<String, DomainError> {
        let started = Instant::now();
        let result = match timeout(deadline, self.transition(operation, id)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::DeadlineExceeded(deadline)),
        };
        let elapsed = started.elapsed();

        let record = match &result {
            Ok(output) => {
                info!(
                    service_id = %id,
                    operation = %operation,
                    duration_ms = elapsed.as_millis() as u64,
                    "Operation succeeded"
                );
                OperationRecord::success(id, operation.as_str(), output.clone(), elapsed)
            }
            Err(e) => {
                warn!(
                    service_id = %id,
                    operation = %operation,
                    duration_ms = elapsed.as_millis() as u64,
                    error_kind = e.kind(),
                    error = %e,
                    "Operation failed"
                );
                OperationRecord::failure(id, operation.as_str(), e, elapsed)
            }
        };
        self.pipeline.submit(record).await;

        result
    }

    async fn transition(&self, operation: Operation, id: ServiceId) -> Result<String, DomainError> {
        let _guard = self.transitions.lock().await;

        // Fresh copy per call, definitions can change between requests
        let definition = self.repository.get_by_id(id).await?;
        let policy = LifecyclePolicy::for_service(&definition);

        debug!(
            service_id = %id,
            service = %definition.name(),
            port = definition.port().value(),
            operation = %operation,
            "Applying lifecycle operation"
        );

        match operation {
            Operation::Start => self.start_service(&definition, &policy).await,
            Operation::Stop => self.stop_service(&definition, &policy).await,
            Operation::Restart => self.restart_service(&definition, &policy).await,
            Operation::ForceRestart => self.force_restart_service(&definition, &policy).await,
            Operation::Kill => self.kill_service(&definition).await,
        }
    }

    async fn start_service(
        &self,
        definition: &ServiceDefinition,
        policy: &LifecyclePolicy,
    ) -> Result<String, DomainError> {
        let command = policy.start_command(definition.name())?;
        if self.monitor.is_listening(definition.port()).await {
            return Err(DomainError::ServiceAlreadyRunning(
                definition.name().to_string(),
            ));
        }
        self.launch(definition, command).await
    }

    async fn stop_service(
        &self,
        definition: &ServiceDefinition,
        policy: &LifecyclePolicy,
    ) -> Result<String, DomainError> {
        self.ensure_running(definition).await?;
        let port = definition.port();

        let output = match &policy.stop {
            StopStrategy::ExplicitCommand(command) => {
                match self.run_command(definition, command).await {
                    Ok(output) => output,
                    Err(stop_err) => {
                        warn!(
                            service = %definition.name(),
                            error = %stop_err,
                            "Stop command failed, killing port owner"
                        );
                        match self.terminator.terminate(port).await {
                            Ok(termination) => format!(
                                "stop command failed: {}\n{}\nforced termination: {}",
                                stop_err,
                                stop_err.output().unwrap_or_default(),
                                termination
                            ),
                            Err(kill_err) => {
                                warn!(
                                    service = %definition.name(),
                                    error = %kill_err,
                                    "Fallback kill failed"
                                );
                                return Err(stop_err);
                            }
                        }
                    }
                }
            }
            StopStrategy::KillPortOwner => self.terminator.terminate(port).await?.to_string(),
        };

        if !self.await_stopped(definition).await {
            return Err(DomainError::StopTimeout { output });
        }
        Ok(output)
    }

    async fn restart_service(
        &self,
        definition: &ServiceDefinition,
        policy: &LifecyclePolicy,
    ) -> Result<String, DomainError> {
        match &policy.restart {
            RestartStrategy::ExplicitCommand(command) => {
                self.ensure_running(definition).await?;
                self.launch(definition, command).await
            }
            RestartStrategy::StopThenStart => {
                let stop_output = self.stop_service(definition, policy).await?;
                if !self.await_port_free(definition).await {
                    return Err(DomainError::StopTimeout {
                        output: stop_output,
                    });
                }
                let start_output = self
                    .start_service(definition, policy)
                    .await
                    .map_err(|e| e.with_output_prefix(&stop_output))?;
                Ok(format!(
                    "stop output:\n{}\nstart output:\n{}",
                    stop_output, start_output
                ))
            }
        }
    }

    async fn force_restart_service(
        &self,
        definition: &ServiceDefinition,
        policy: &LifecyclePolicy,
    ) -> Result<String, DomainError> {
        let command = policy.start_command(definition.name())?;

        let mut kill_output = String::new();
        if self.monitor.is_listening(definition.port()).await {
            kill_output = self.terminator.terminate(definition.port()).await?.to_string();
            if !self.await_port_free(definition).await {
                return Err(DomainError::StopTimeout {
                    output: kill_output,
                });
            }
        }

        // A failed start is reported as such, the kill output only rides along
        let start_output = self
            .launch(definition, command)
            .await
            .map_err(|e| e.with_output_prefix(&kill_output))?;

        if kill_output.is_empty() {
            Ok(start_output)
        } else {
            Ok(format!(
                "kill output:\n{}\nstart output:\n{}",
                kill_output, start_output
            ))
        }
    }

    async fn kill_service(&self, definition: &ServiceDefinition) -> Result<String, DomainError> {
        self.ensure_running(definition).await?;
        let output = self.terminator.terminate(definition.port()).await?.to_string();
        if !self.await_stopped(definition).await {
            return Err(DomainError::StopTimeout { output });
        }
        Ok(output)
    }

    /// Run `command` and wait for the port to be bound
    async fn launch(&self, definition: &ServiceDefinition, command: &str) -> Result<String, DomainError> {
        let output = self.run_command(definition, command).await?;
        let running = self
            .await_state(
                definition,
                RunState::Running,
                self.settings.start_wait,
                self.settings.poll_interval,
            )
            .await;
        if !running {
            return Err(DomainError::StartTimeout { output });
        }
        Ok(output)
    }

    async fn run_command(&self, definition: &ServiceDefinition, command: &str) -> Result<String, DomainError> {
        self.executor
            .run(command, definition.work_dir(), self.settings.command_timeout)
            .await
    }

    async fn ensure_running(&self, definition: &ServiceDefinition) -> Result<(), DomainError> {
        if self.monitor.is_listening(definition.port()).await {
            Ok(())
        } else {
            Err(DomainError::ServiceNotRunning(definition.name().to_string()))
        }
    }

    async fn await_stopped(&self, definition: &ServiceDefinition) -> bool {
        self.await_state(
            definition,
            RunState::Stopped,
            self.settings.stop_wait,
            self.settings.poll_interval,
        )
        .await
    }

    async fn await_port_free(&self, definition: &ServiceDefinition) -> bool {
        self.await_state(
            definition,
            RunState::Stopped,
            self.settings.port_free_wait,
            self.settings.port_free_poll,
        )
        .await
    }

    async fn await_state(
        &self,
        definition: &ServiceDefinition,
        expected: RunState,
        window: Duration,
        interval: Duration,
    ) -> bool {
        let reached = self
            .monitor
            .wait_for_state(definition.port(), expected, window, interval)
            .await;
        // Port ownership changed (or was expected to), cached owners are stale
        self.monitor.invalidate_cache().await;
        if !reached {
            warn!(
                service = %definition.name(),
                port = definition.port().value(),
                expected = %expected,
                window_ms = window.as_millis() as u64,
                "Service did not reach expected state"
            );
        }
        reached
    }
}

#[async_trait]
impl LifecycleOperator for ProcessController {
    async fn execute(
        &self,
        operation: Operation,
        service_id: ServiceId,
        deadline: Duration,
    ) -> Result<String, DomainError> {
        self.run(operation, service_id, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{
        CommandOutput, MockCommandRunner, PortProbe, PortScanner, ProcessSignaller, Signal,
    };
    use crate::domain::services::CommandPolicy;
    use crate::domain::value_objects::{PipelineSettings, Port, PortOwner};
    use crate::infrastructure::{InMemoryLogStore, InMemoryServiceRepository};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Listeners(StdMutex<HashMap<u16, PortOwner>>);

    #[async_trait]
    impl PortProbe for Listeners {
        async fn is_listening(&self, port: u16, _timeout: Duration) -> bool {
            self.0.lock().unwrap().contains_key(&port)
        }
    }

    #[async_trait]
    impl PortScanner for Listeners {
        async fn scan(&self) -> Result<HashMap<u16, PortOwner>, DomainError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl ProcessSignaller for Listeners {
        async fn signal(&self, pid: u32, _signal: Signal) -> Result<(), DomainError> {
            self.0.lock().unwrap().retain(|_, o| o.pid != pid);
            Ok(())
        }

        fn current_pid(&self) -> u32 {
            1_000_000
        }
    }

    fn fast_settings() -> ControllerSettings {
        ControllerSettings {
            poll_interval: Duration::from_millis(5),
            start_wait: Duration::from_millis(40),
            stop_wait: Duration::from_millis(40),
            port_free_wait: Duration::from_millis(40),
            port_free_poll: Duration::from_millis(5),
            kill_grace: Duration::from_millis(20),
            ..ControllerSettings::default()
        }
    }

    struct Fixture {
        controller: ProcessController,
        listeners: Arc<Listeners>,
        store: Arc<InMemoryLogStore>,
        pipeline: Arc<OperationLogPipeline>,
        id: ServiceId,
    }

    async fn fixture(runner: MockCommandRunner, stop_cmd: Option<&str>) -> Fixture {
        let listeners = Arc::new(Listeners::default());
        let repository = Arc::new(InMemoryServiceRepository::new());
        let mut builder =
            ServiceDefinition::builder("web", Port::new(8080).unwrap(), "./start.sh").work_dir("/");
        if let Some(cmd) = stop_cmd {
            builder = builder.stop_cmd(cmd);
        }
        let definition = builder.build().unwrap();
        let id = repository.create(definition).await.unwrap().id();

        let settings = fast_settings();
        let monitor = Arc::new(PortMonitor::new(
            listeners.clone(),
            listeners.clone(),
            settings.snapshot_ttl,
            settings.probe_timeout,
        ));
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = Arc::new(OperationLogPipeline::start(
            store.clone(),
            PipelineSettings::default(),
        ));
        let terminator = PortOwnerTerminator::new(
            monitor.clone(),
            listeners.clone(),
            settings.kill_grace,
            settings.port_free_poll,
        );
        let controller = ProcessController::new(
            repository,
            monitor,
            Arc::new(CommandExecutor::new(CommandPolicy::default(), Arc::new(runner))),
            terminator,
            pipeline.clone(),
            settings,
        );
        Fixture {
            controller,
            listeners,
            store,
            pipeline,
            id,
        }
    }

    fn exit(code: i32, output: &str) -> CommandOutput {
        CommandOutput {
            output: output.to_string(),
            exit_code: Some(code),
            timed_out: false,
        }
    }

    #[tokio::test]
    async fn test_start_on_running_service_runs_nothing() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let f = fixture(runner, None).await;
        f.listeners
            .0
            .lock()
            .unwrap()
            .insert(8080, PortOwner::new(77, "server"));

        let result = f.controller.start(f.id).await;
        assert!(matches!(result, Err(DomainError::ServiceAlreadyRunning(_))));

        f.pipeline.shutdown().await;
        let records = f.store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, "start");
        assert!(!records[0].is_success());
    }

    #[tokio::test]
    async fn test_start_binds_port() {
        let listeners_slot: Arc<StdMutex<Option<Arc<Listeners>>>> = Arc::new(StdMutex::new(None));
        let slot = listeners_slot.clone();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(move |_| {
            if let Some(l) = slot.lock().unwrap().as_ref() {
                l.0.lock().unwrap().insert(8080, PortOwner::new(55, "server"));
            }
            Ok(exit(0, "booted"))
        });
        let f = fixture(runner, None).await;
        *listeners_slot.lock().unwrap() = Some(f.listeners.clone());

        assert_eq!(f.controller.start(f.id).await.unwrap(), "booted");
    }

    #[tokio::test]
    async fn test_start_that_never_binds_times_out_with_output() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(exit(0, "daemonized")));
        let f = fixture(runner, None).await;

        match f.controller.start(f.id).await {
            Err(DomainError::StartTimeout { output }) => assert_eq!(output, "daemonized"),
            other => panic!("expected start timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_and_kill_on_stopped_service() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let f = fixture(runner, Some("./stop.sh")).await;

        assert!(matches!(
            f.controller.stop(f.id).await,
            Err(DomainError::ServiceNotRunning(_))
        ));
        assert!(matches!(
            f.controller.kill(f.id).await,
            Err(DomainError::ServiceNotRunning(_))
        ));
        assert!(matches!(
            f.controller.restart(f.id).await,
            Err(DomainError::ServiceNotRunning(_))
        ));

        f.pipeline.shutdown().await;
        assert_eq!(f.store.len().await, 3);
    }

    #[tokio::test]
    async fn test_failed_stop_command_falls_back_to_kill() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(exit(1, "pidfile missing")));
        let f = fixture(runner, Some("./stop.sh")).await;
        f.listeners
            .0
            .lock()
            .unwrap()
            .insert(8080, PortOwner::new(77, "server"));

        let output = f.controller.stop(f.id).await.unwrap();
        assert!(output.contains("pidfile missing"));
        assert!(output.contains("forced termination"));
        assert!(f.listeners.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let f = fixture(runner, None).await;

        let result = f.controller.start(ServiceId::new(404)).await;
        assert!(matches!(result, Err(DomainError::ServiceNotFound(_))));

        f.pipeline.shutdown().await;
        let records = f.store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service_id, ServiceId::new(404));
    }

    #[tokio::test]
    async fn test_deadline_is_recorded() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let f = fixture(runner, None).await;

        // Hold the transition lock so the call cannot make progress
        let guard = f.controller.transitions.lock().await;
        let result = f
            .controller
            .run(Operation::Start, f.id, Duration::from_millis(20))
            .await;
        drop(guard);

        assert!(matches!(result, Err(DomainError::DeadlineExceeded(_))));
        f.pipeline.shutdown().await;
        let records = f.store.records().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].error_message.contains("deadline"));
    }
}
