//! Operation Log Pipeline
//!
//! Asynchronous, batched writer of operation records. Callers enqueue onto a
//! bounded channel; one worker flushes when the batch is full or the flush
//! timer fires. A full (or closed) channel degrades to a synchronous write
//! with a short timeout, so a record is never dropped. Shutdown drains the
//! channel and flushes the remainder before returning.
//!
//! Delivery is at least once: a batch write that times out may still land,
//! and its records are then written again one by one.

use crate::domain::ports::LogStore;
use crate::domain::value_objects::{OperationRecord, PipelineSettings};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// `interval` rejects a zero period
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Counters exposed for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub records_written: u64,
    pub failed_flushes: u64,
    pub fallback_writes: u64,
    pub records_lost: u64,
    pub last_flush: Option<DateTime<Utc>>,
    pub queued: usize,
    pub channel_capacity: usize,
    pub batch_size: usize,
}

#[derive(Default)]
struct Counters {
    written: AtomicU64,
    failed_flushes: AtomicU64,
    fallback_writes: AtomicU64,
    lost: AtomicU64,
    // Unix millis of the last successful flush, 0 = never
    last_flush_ms: AtomicI64,
}

pub struct OperationLogPipeline {
    sender: mpsc::Sender<OperationRecord>,
    store: Arc<dyn LogStore>,
    settings: PipelineSettings,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OperationLogPipeline {
    /// Spawn the flush worker on the current runtime
    pub fn start(store: Arc<dyn LogStore>, mut settings: PipelineSettings) -> Self {
        settings.flush_interval = settings.flush_interval.max(MIN_FLUSH_INTERVAL);
        let (sender, receiver) = mpsc::channel(settings.channel_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let shutdown = CancellationToken::new();

        let worker = Worker {
            receiver,
            store: Arc::clone(&store),
            settings: settings.clone(),
            counters: Arc::clone(&counters),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run());

        info!(
            channel_capacity = settings.channel_capacity,
            batch_size = settings.batch_size,
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            "Operation log pipeline started"
        );

        Self {
            sender,
            store,
            settings,
            counters,
            shutdown,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Hand a record to the pipeline. Returns once the record is queued, or
    /// once the fallback write finished when the queue is full or closed.
    pub async fn submit(&self, record: OperationRecord) {
        let record = record.truncated(self.settings.max_output_bytes, self.settings.max_error_bytes);
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!(
                    service_id = %record.service_id,
                    operation = %record.operation,
                    "Log channel full, writing record directly"
                );
                self.write_direct(record).await;
            }
            Err(TrySendError::Closed(record)) => {
                debug!(
                    service_id = %record.service_id,
                    "Log pipeline closed, writing record directly"
                );
                self.write_direct(record).await;
            }
        }
    }

    async fn write_direct(&self, record: OperationRecord) {
        self.counters.fallback_writes.fetch_add(1, Ordering::Relaxed);
        write_with_timeout(&*self.store, &record, &self.settings, &self.counters).await;
    }

    /// Stop accepting queued records, drain and flush everything already
    /// queued, and wait for the worker. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Log pipeline worker panicked");
            }
            info!(
                records_written = self.counters.written.load(Ordering::Relaxed),
                records_lost = self.counters.lost.load(Ordering::Relaxed),
                "Operation log pipeline stopped"
            );
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let last_flush_ms = self.counters.last_flush_ms.load(Ordering::Relaxed);
        PipelineStats {
            records_written: self.counters.written.load(Ordering::Relaxed),
            failed_flushes: self.counters.failed_flushes.load(Ordering::Relaxed),
            fallback_writes: self.counters.fallback_writes.load(Ordering::Relaxed),
            records_lost: self.counters.lost.load(Ordering::Relaxed),
            last_flush: (last_flush_ms > 0)
                .then(|| Utc.timestamp_millis_opt(last_flush_ms).single())
                .flatten(),
            queued: self.settings.channel_capacity.max(1) - self.sender.capacity(),
            channel_capacity: self.settings.channel_capacity,
            batch_size: self.settings.batch_size,
        }
    }
}

struct Worker {
    receiver: mpsc::Receiver<OperationRecord>,
    store: Arc<dyn LogStore>,
    settings: PipelineSettings,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        let batch_size = self.settings.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut ticker = interval(self.settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.receiver.recv() => match received {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_size {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch).await;
                    }
                }
            }
        }

        // Drain whatever was queued before shutdown started
        self.receiver.close();
        while let Some(record) = self.receiver.recv().await {
            batch.push(record);
            if batch.len() >= batch_size {
                self.flush(&mut batch).await;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch).await;
        }
    }

    async fn flush(&self, batch: &mut Vec<OperationRecord>) {
        let records = std::mem::take(batch);
        let count = records.len();

        match timeout(self.settings.flush_timeout, self.store.write_batch(&records)).await {
            Ok(Ok(())) => {
                self.counters
                    .written
                    .fetch_add(count as u64, Ordering::Relaxed);
                self.counters
                    .last_flush_ms
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
                debug!(records = count, "Flushed operation records");
            }
            outcome => {
                self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                match outcome {
                    Ok(Err(e)) => warn!(records = count, error = %e, "Batch flush failed, retrying record by record"),
                    _ => warn!(records = count, "Batch flush timed out, retrying record by record"),
                }
                for record in &records {
                    write_with_timeout(&*self.store, record, &self.settings, &self.counters).await;
                }
            }
        }
    }
}

/// Single-record write used by the fallback and retry paths
async fn write_with_timeout(
    store: &dyn LogStore,
    record: &OperationRecord,
    settings: &PipelineSettings,
    counters: &Counters,
) {
    match timeout(settings.fallback_timeout, store.write_one(record)).await {
        Ok(Ok(())) => {
            counters.written.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            counters.lost.fetch_add(1, Ordering::Relaxed);
            error!(
                service_id = %record.service_id,
                operation = %record.operation,
                status = %record.status,
                error = %e,
                "Failed to persist operation record"
            );
        }
        Err(_) => {
            counters.lost.fetch_add(1, Ordering::Relaxed);
            error!(
                service_id = %record.service_id,
                operation = %record.operation,
                status = %record.status,
                timeout_ms = settings.fallback_timeout.as_millis() as u64,
                "Timed out persisting operation record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ServiceId;
    use crate::domain::DomainError;
    use crate::infrastructure::InMemoryLogStore;

    fn record(id: i64) -> OperationRecord {
        OperationRecord::success(ServiceId::new(id), "start", "ok", Duration::from_millis(5))
    }

    fn settings(capacity: usize, batch_size: usize, flush_interval: Duration) -> PipelineSettings {
        PipelineSettings {
            channel_capacity: capacity,
            batch_size,
            flush_interval,
            ..PipelineSettings::default()
        }
    }

    #[tokio::test]
    async fn test_flushes_when_batch_is_full() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(
            store.clone(),
            settings(100, 3, Duration::from_secs(3600)),
        );

        for id in 1..=3 {
            pipeline.submit(record(id)).await;
        }
        // No timer tick can happen, so only the size threshold can flush
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.len().await < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("batch was not flushed");

        assert_eq!(store.batch_count().await, 1);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_flushes_on_timer() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(
            store.clone(),
            settings(100, 50, Duration::from_millis(30)),
        );

        pipeline.submit(record(1)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.len().await, 1);
        assert!(pipeline.stats().last_flush.is_some());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_flush_interval_still_batches() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(store.clone(), settings(100, 50, Duration::ZERO));

        for id in 1..=3 {
            pipeline.submit(record(id)).await;
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.len().await < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("records were not flushed by the timer");
        pipeline.shutdown().await;

        let stats = pipeline.stats();
        assert!(stats.last_flush.is_some());
        assert_eq!(stats.fallback_writes, 0);
        assert_eq!(stats.records_written, 3);
    }

    #[tokio::test]
    async fn test_shutdown_drains_everything_beyond_capacity() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(
            store.clone(),
            settings(4, 3, Duration::from_secs(3600)),
        );

        for id in 1..=25 {
            pipeline.submit(record(id)).await;
        }
        pipeline.shutdown().await;

        let mut ids: Vec<i64> = store
            .records()
            .await
            .iter()
            .map(|r| r.service_id.value())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());

        let stats = pipeline.stats();
        assert_eq!(stats.records_written, 25);
        assert_eq!(stats.records_lost, 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_writes_directly() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(store.clone(), PipelineSettings::default());
        pipeline.shutdown().await;
        pipeline.shutdown().await;

        pipeline.submit(record(9)).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(pipeline.stats().fallback_writes, 1);
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried_record_by_record() {
        let store = Arc::new(InMemoryLogStore::new());
        store.fail_batches(true);
        let pipeline = OperationLogPipeline::start(
            store.clone(),
            settings(100, 2, Duration::from_secs(3600)),
        );

        pipeline.submit(record(1)).await;
        pipeline.submit(record(2)).await;
        pipeline.shutdown().await;

        assert_eq!(store.len().await, 2);
        let stats = pipeline.stats();
        assert_eq!(stats.failed_flushes, 1);
        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.records_lost, 0);
    }

    #[tokio::test]
    async fn test_records_are_truncated_on_submit() {
        let store = Arc::new(InMemoryLogStore::new());
        let pipeline = OperationLogPipeline::start(
            store.clone(),
            PipelineSettings {
                max_output_bytes: 8,
                max_error_bytes: 4,
                ..PipelineSettings::default()
            },
        );

        let failed = OperationRecord::failure(
            ServiceId::new(1),
            "stop",
            &DomainError::StopTimeout {
                output: "a very long output".to_string(),
            },
            Duration::ZERO,
        );
        pipeline.submit(failed).await;
        pipeline.shutdown().await;

        let stored = store.records().await;
        assert!(stored[0].output.starts_with("a very l"));
        assert!(stored[0].output.ends_with("...[truncated]"));
        assert!(stored[0].error_message.ends_with("...[truncated]"));
    }
}
