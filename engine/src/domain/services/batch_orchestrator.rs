//! Batch Orchestrator
//!
//! Fans one lifecycle operation out over many services under a concurrency
//! cap. Every unit runs under its own timeout, and the result list always
//! has one entry per input id, in input order.

use crate::domain::ports::ServiceRepository;
use crate::domain::services::{LifecycleOperator, OperationLogPipeline, PortMonitor};
use crate::domain::value_objects::{
    BatchReport, ControllerSettings, Operation, OperationRecord, OperationResult, ServiceId,
};
use crate::domain::DomainError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Extra time granted past the unit deadline before the orchestrator gives up
/// on an operator that ignores its deadline
const UNIT_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

pub struct BatchOrchestrator {
    operator: Arc<dyn LifecycleOperator>,
    repository: Arc<dyn ServiceRepository>,
    monitor: Arc<PortMonitor>,
    pipeline: Arc<OperationLogPipeline>,
    concurrency_cap: usize,
    unit_timeout: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        operator: Arc<dyn LifecycleOperator>,
        repository: Arc<dyn ServiceRepository>,
        monitor: Arc<PortMonitor>,
        pipeline: Arc<OperationLogPipeline>,
        settings: &ControllerSettings,
    ) -> Self {
        Self {
            operator,
            repository,
            monitor,
            pipeline,
            concurrency_cap: settings.batch_concurrency.max(1),
            unit_timeout: settings.batch_unit_timeout,
        }
    }

    /// Apply `operation` to every id; one result per id, in input order
    pub async fn run_batch(&self, ids: &[ServiceId], operation: Operation) -> Vec<OperationResult> {
        if ids.is_empty() {
            return Vec::new();
        }

        let permits = self.concurrency_cap.min(ids.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        info!(
            operation = %operation,
            services = ids.len(),
            concurrency = permits,
            "Starting batch operation"
        );

        for (index, id) in ids.iter().copied().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let operator = Arc::clone(&self.operator);
            let unit_timeout = self.unit_timeout;

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(
                            unit_timeout + UNIT_TIMEOUT_SLACK,
                            operator.execute(operation, id, unit_timeout),
                        )
                        .await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => Err(DomainError::DeadlineExceeded(unit_timeout)),
                        }
                    }
                    Err(_) => Err(DomainError::DeadlineExceeded(unit_timeout)),
                };
                (index, OperationResult::from_outcome(id, outcome))
            });
        }

        let mut slots: Vec<Option<OperationResult>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!(error = %e, "Batch unit panicked"),
            }
        }

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| {
                    OperationResult::failed(
                        *id,
                        &DomainError::CommandFailed {
                            message: "batch unit aborted".to_string(),
                            exit_code: None,
                            output: String::new(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Batch addressed by operation name. An unknown name fails every id
    /// individually (and records each failure) rather than the whole call.
    pub async fn run_batch_named(&self, ids: &[ServiceId], operation: &str) -> BatchReport {
        match Operation::parse(operation) {
            Some(op) => BatchReport::new(op.as_str(), self.run_batch(ids, op).await),
            None => {
                let error = DomainError::UnsupportedOperation(operation.to_string());
                warn!(operation = %operation, services = ids.len(), "Unsupported batch operation");
                let mut results = Vec::with_capacity(ids.len());
                for id in ids {
                    self.pipeline
                        .submit(OperationRecord::failure(*id, operation, &error, Duration::ZERO))
                        .await;
                    results.push(OperationResult::failed(*id, &error));
                }
                BatchReport::new(operation, results)
            }
        }
    }

    /// Start every stopped service; running ones are reported as skipped
    pub async fn start_all(&self) -> Result<BatchReport, DomainError> {
        self.run_on_partition(Operation::Start, false, "already running")
            .await
    }

    /// Stop every running service; stopped ones are reported as skipped
    pub async fn stop_all(&self) -> Result<BatchReport, DomainError> {
        self.run_on_partition(Operation::Stop, true, "not running")
            .await
    }

    /// Restart every running service; stopped ones are reported as skipped
    pub async fn restart_all(&self) -> Result<BatchReport, DomainError> {
        self.run_on_partition(Operation::Restart, true, "not running")
            .await
    }

    /// Apply `operation` to services whose running state equals `target_running`
    async fn run_on_partition(
        &self,
        operation: Operation,
        target_running: bool,
        skip_reason: &str,
    ) -> Result<BatchReport, DomainError> {
        let definitions = self.repository.find_all().await?;
        let snapshot = self.monitor.snapshot().await?;

        let mut targets = Vec::new();
        let mut slots: Vec<Option<OperationResult>> = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            if snapshot.is_listening(definition.port().value()) == target_running {
                targets.push(definition.id());
                slots.push(None);
            } else {
                slots.push(Some(OperationResult::skipped(definition.id(), skip_reason)));
            }
        }

        let mut executed = self.run_batch(&targets, operation).await.into_iter();
        let results = slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| executed.next()))
            .collect();

        Ok(BatchReport::new(operation.as_str(), results))
    }
}
