//! Service Manager
//! Composition root: wires ports into the domain services and exposes the
//! operations callers (the CLI, an HTTP layer) consume.

use crate::domain::entities::ServiceDefinition;
use crate::domain::ports::{
    CommandRunner, LogQuery, LogStore, PortProbe, PortScanner, ProcessSignaller, ServiceRepository,
};
use crate::domain::services::{
    BatchOrchestrator, CommandExecutor, CommandPolicy, OperationLogPipeline, PipelineStats,
    PortMonitor, PortOwnerTerminator, ProcessController, ServiceCatalog, ServiceFilter,
    ServiceList, ServiceSummary,
};
use crate::domain::value_objects::{
    BatchReport, ControllerSettings, LogStats, Operation, OperationRecord, OperationResult,
    PipelineSettings, PortSnapshot, ServiceId, ServiceStatus,
};
use crate::domain::DomainError;
use crate::infrastructure::{
    Config, InMemoryLogStore, InMemoryServiceRepository, JsonLinesLogStore, LibcSignaller,
    ProcfsPortScanner, TcpPortProbe, TokioCommandRunner,
};
use std::sync::Arc;
use tracing::info;

/// Every driven adapter the engine needs
#[derive(Clone)]
pub struct Adapters {
    pub repository: Arc<dyn ServiceRepository>,
    pub probe: Arc<dyn PortProbe>,
    pub scanner: Arc<dyn PortScanner>,
    pub runner: Arc<dyn CommandRunner>,
    pub signaller: Arc<dyn ProcessSignaller>,
    pub log_store: Arc<dyn LogStore>,
    pub log_query: Arc<dyn LogQuery>,
}

pub struct ServiceManager {
    catalog: ServiceCatalog,
    controller: Arc<ProcessController>,
    batch: BatchOrchestrator,
    monitor: Arc<PortMonitor>,
    pipeline: Arc<OperationLogPipeline>,
    log_query: Arc<dyn LogQuery>,
}

impl ServiceManager {
    /// Build the engine on the real host from a loaded configuration,
    /// seeding the repository with the configured services
    pub async fn from_config(config: &Config) -> Result<Self, DomainError> {
        let repository = Arc::new(InMemoryServiceRepository::new());
        for definition in config.service_definitions()? {
            repository.create(definition).await?;
        }

        let (log_store, log_query): (Arc<dyn LogStore>, Arc<dyn LogQuery>) =
            match config.log_path() {
                Some(path) => {
                    let store = Arc::new(JsonLinesLogStore::open(path).await?);
                    (store.clone() as Arc<dyn LogStore>, store as Arc<dyn LogQuery>)
                }
                None => {
                    let store = Arc::new(InMemoryLogStore::new());
                    (store.clone() as Arc<dyn LogStore>, store as Arc<dyn LogQuery>)
                }
            };

        let adapters = Adapters {
            repository,
            probe: Arc::new(TcpPortProbe::new()),
            scanner: Arc::new(ProcfsPortScanner::new()),
            runner: Arc::new(TokioCommandRunner::new()),
            signaller: Arc::new(LibcSignaller::new()),
            log_store,
            log_query,
        };
        Ok(Self::with_adapters(
            adapters,
            config.controller_settings(),
            config.pipeline_settings(),
        ))
    }

    /// Wire the engine over arbitrary adapters. Spawns the log pipeline
    /// worker, so it must be called inside a tokio runtime.
    pub fn with_adapters(
        adapters: Adapters,
        settings: ControllerSettings,
        pipeline_settings: PipelineSettings,
    ) -> Self {
        let monitor = Arc::new(PortMonitor::new(
            adapters.probe,
            adapters.scanner,
            settings.snapshot_ttl,
            settings.probe_timeout,
        ));
        let pipeline = Arc::new(OperationLogPipeline::start(
            adapters.log_store,
            pipeline_settings,
        ));
        let executor = Arc::new(
            CommandExecutor::new(
                CommandPolicy::new(settings.allow_shell_operators),
                adapters.runner,
            )
            .with_output_limit(settings.max_output_bytes),
        );
        let terminator = PortOwnerTerminator::new(
            monitor.clone(),
            adapters.signaller,
            settings.kill_grace,
            settings.port_free_poll,
        );

        let controller = Arc::new(ProcessController::new(
            adapters.repository.clone(),
            monitor.clone(),
            executor,
            terminator,
            pipeline.clone(),
            settings.clone(),
        ));
        let batch = BatchOrchestrator::new(
            controller.clone(),
            adapters.repository.clone(),
            monitor.clone(),
            pipeline.clone(),
            &settings,
        );
        let catalog = ServiceCatalog::new(adapters.repository, monitor.clone());

        info!(
            batch_concurrency = settings.batch_concurrency,
            allow_shell_operators = settings.allow_shell_operators,
            "Service manager ready"
        );

        Self {
            catalog,
            controller,
            batch,
            monitor,
            pipeline,
            log_query: adapters.log_query,
        }
    }

    // Lifecycle

    pub async fn start(&self, id: ServiceId) -> Result<String, DomainError> {
        self.controller.start(id).await
    }

    pub async fn stop(&self, id: ServiceId) -> Result<String, DomainError> {
        self.controller.stop(id).await
    }

    pub async fn restart(&self, id: ServiceId) -> Result<String, DomainError> {
        self.controller.restart(id).await
    }

    pub async fn force_restart(&self, id: ServiceId) -> Result<String, DomainError> {
        self.controller.force_restart(id).await
    }

    pub async fn kill(&self, id: ServiceId) -> Result<String, DomainError> {
        self.controller.kill(id).await
    }

    /// Single operation addressed by value
    pub async fn execute(&self, operation: Operation, id: ServiceId) -> Result<String, DomainError> {
        match operation {
            Operation::Start => self.start(id).await,
            Operation::Stop => self.stop(id).await,
            Operation::Restart => self.restart(id).await,
            Operation::ForceRestart => self.force_restart(id).await,
            Operation::Kill => self.kill(id).await,
        }
    }

    // Batches

    pub async fn run_batch(&self, ids: &[ServiceId], operation: Operation) -> Vec<OperationResult> {
        self.batch.run_batch(ids, operation).await
    }

    pub async fn batch_operation(&self, ids: &[ServiceId], operation: &str) -> BatchReport {
        self.batch.run_batch_named(ids, operation).await
    }

    pub async fn start_all(&self) -> Result<BatchReport, DomainError> {
        self.batch.start_all().await
    }

    pub async fn stop_all(&self) -> Result<BatchReport, DomainError> {
        self.batch.stop_all().await
    }

    pub async fn restart_all(&self) -> Result<BatchReport, DomainError> {
        self.batch.restart_all().await
    }

    // Catalog

    pub async fn create_service(
        &self,
        definition: ServiceDefinition,
    ) -> Result<ServiceDefinition, DomainError> {
        self.catalog.create(definition).await
    }

    pub async fn update_service(
        &self,
        definition: ServiceDefinition,
    ) -> Result<ServiceDefinition, DomainError> {
        self.catalog.update(definition).await
    }

    pub async fn delete_service(&self, id: ServiceId) -> Result<(), DomainError> {
        self.catalog.delete(id).await
    }

    pub async fn get_service(&self, id: ServiceId) -> Result<ServiceDefinition, DomainError> {
        self.catalog.get(id).await
    }

    pub async fn get_status(&self, id: ServiceId) -> Result<ServiceStatus, DomainError> {
        self.catalog.get_status(id).await
    }

    pub async fn list_with_status(&self, filter: &ServiceFilter) -> Result<ServiceList, DomainError> {
        self.catalog.list_with_status(filter).await
    }

    pub async fn summary(&self) -> Result<ServiceSummary, DomainError> {
        self.catalog.summary().await
    }

    // Ports

    pub async fn is_port_in_use(&self, port: &str) -> Result<bool, DomainError> {
        self.monitor.is_port_in_use(port).await
    }

    pub async fn port_snapshot(&self) -> Result<Arc<PortSnapshot>, DomainError> {
        self.monitor.snapshot().await
    }

    pub async fn invalidate_port_cache(&self) {
        self.monitor.invalidate_cache().await
    }

    // Operation log

    pub async fn recent_operations(
        &self,
        service_id: Option<ServiceId>,
        limit: usize,
    ) -> Result<Vec<OperationRecord>, DomainError> {
        self.log_query.recent(service_id, limit).await
    }

    pub async fn prune_operations(&self, days: u32) -> Result<usize, DomainError> {
        self.log_query.prune_older_than(days).await
    }

    pub async fn operation_stats(&self) -> Result<LogStats, DomainError> {
        self.log_query.stats().await
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Drain and flush the operation log; later records go straight to the store
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
        info!("Service manager stopped");
    }
}
