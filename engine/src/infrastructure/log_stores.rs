//! Operation Log Stores
//!
//! - `InMemoryLogStore`: records kept in process memory
//! - `JsonLinesLogStore`: one JSON object per line, appended to a file

use crate::domain::ports::{LogQuery, LogStore};
use crate::domain::value_objects::{LogStats, OperationRecord, ServiceId};
use crate::domain::DomainError;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Most recent matches first, at most `limit`
fn newest_first(
    records: impl DoubleEndedIterator<Item = OperationRecord>,
    service_id: Option<ServiceId>,
    limit: usize,
) -> Vec<OperationRecord> {
    records
        .rev()
        .filter(|r| service_id.map_or(true, |id| r.service_id == id))
        .take(limit)
        .collect()
}

/// One JSON object per line, newline terminated
fn encode_lines(records: &[OperationRecord]) -> Result<String, DomainError> {
    let mut buf = String::new();
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| DomainError::LogStore(format!("Failed to encode record: {}", e)))?;
        buf.push_str(&line);
        buf.push('\n');
    }
    Ok(buf)
}

/// Oldest timestamp still retained; a window reaching past the
/// representable range keeps everything
fn retention_cutoff(days: u32) -> DateTime<Utc> {
    chrono::Duration::try_days(i64::from(days))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct InMemoryLogStore {
    records: Mutex<Vec<OperationRecord>>,
    batches: AtomicUsize,
    fail_batches: AtomicBool,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `write_batch` fail, leaving `write_one` working
    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Number of successful batch writes
    pub async fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Stored records in write order
    pub async fn records(&self) -> Vec<OperationRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn write_batch(&self, records: &[OperationRecord]) -> Result<(), DomainError> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(DomainError::LogStore("batch writes disabled".to_string()));
        }
        self.records.lock().await.extend_from_slice(records);
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_one(&self, record: &OperationRecord) -> Result<(), DomainError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl LogQuery for InMemoryLogStore {
    async fn recent(
        &self,
        service_id: Option<ServiceId>,
        limit: usize,
    ) -> Result<Vec<OperationRecord>, DomainError> {
        let records = self.records.lock().await.clone();
        Ok(newest_first(records.into_iter(), service_id, limit))
    }

    async fn prune_older_than(&self, days: u32) -> Result<usize, DomainError> {
        let cutoff = retention_cutoff(days);
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        Ok(before - records.len())
    }

    async fn stats(&self) -> Result<LogStats, DomainError> {
        let records = self.records.lock().await;
        Ok(LogStats::tally(records.iter(), Local::now().date_naive()))
    }
}

// ============================================================================
// JSON lines file
// ============================================================================

pub struct JsonLinesLogStore {
    path: PathBuf,
    /// Serialises appends and rewrites of the file; an append holds it until
    /// its blocking write finishes
    write_lock: Arc<Mutex<()>>,
}

impl JsonLinesLogStore {
    /// Create the store, creating parent directories of `path` if needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::LogStore(format!(
                    "Failed to create log directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        info!(path = %path.display(), "Operation log file ready");
        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records` as one buffer in a single blocking `write_all`. The
    /// write runs to completion even when the awaiting caller is dropped, so
    /// a timed-out batch never leaves a half-written line behind.
    async fn append(&self, records: &[OperationRecord]) -> Result<(), DomainError> {
        let buf = encode_lines(records)?;

        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let _guard = guard;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(buf.as_bytes())?;
            file.flush()
        })
        .await
        .map_err(|e| DomainError::LogStore(format!("Log append task failed: {}", e)))?;
        written.map_err(|e| self.io_error("append to", e))?;

        debug!(path = %self.path.display(), records = records.len(), "Appended operation records");
        Ok(())
    }

    /// Every parseable record in file order; a missing file is empty
    async fn load(&self) -> Result<Vec<OperationRecord>, DomainError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error("read", e)),
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OperationRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed operation record"
                ),
            }
        }
        Ok(records)
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> DomainError {
        DomainError::LogStore(format!(
            "Failed to {} '{}': {}",
            action,
            self.path.display(),
            e
        ))
    }
}

#[async_trait]
impl LogStore for JsonLinesLogStore {
    async fn write_batch(&self, records: &[OperationRecord]) -> Result<(), DomainError> {
        if records.is_empty() {
            return Ok(());
        }
        self.append(records).await
    }

    async fn write_one(&self, record: &OperationRecord) -> Result<(), DomainError> {
        self.append(std::slice::from_ref(record)).await
    }
}

#[async_trait]
impl LogQuery for JsonLinesLogStore {
    async fn recent(
        &self,
        service_id: Option<ServiceId>,
        limit: usize,
    ) -> Result<Vec<OperationRecord>, DomainError> {
        let records = self.load().await?;
        Ok(newest_first(records.into_iter(), service_id, limit))
    }

    async fn prune_older_than(&self, days: u32) -> Result<usize, DomainError> {
        let _guard = self.write_lock.lock().await;
        let records = self.load().await?;
        let cutoff = retention_cutoff(days);

        let (kept, dropped): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.timestamp >= cutoff);
        if dropped.is_empty() {
            return Ok(0);
        }

        let buf = encode_lines(&kept)?;

        // Rewrite through a sibling file so readers never see a partial log
        let tmp = self.path.with_extension("prune.tmp");
        tokio::fs::write(&tmp, buf)
            .await
            .map_err(|e| self.io_error("write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error("replace", e))?;

        info!(
            path = %self.path.display(),
            removed = dropped.len(),
            kept = kept.len(),
            "Pruned operation log"
        );
        Ok(dropped.len())
    }

    async fn stats(&self) -> Result<LogStats, DomainError> {
        let records = self.load().await?;
        Ok(LogStats::tally(&records, Local::now().date_naive()))
    }
}
