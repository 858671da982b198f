//! LogStore and LogQuery ports
//! Durable sink for operation records and the read side used by `svcctl logs`

use crate::domain::value_objects::{LogStats, OperationRecord, ServiceId};
use crate::domain::DomainError;
use async_trait::async_trait;

/// Append-only writer of operation records
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist a batch of records; all or nothing
    async fn write_batch(&self, records: &[OperationRecord]) -> Result<(), DomainError>;

    /// Persist one record (fallback and retry path)
    async fn write_one(&self, record: &OperationRecord) -> Result<(), DomainError>;
}

/// Queries over stored records
#[async_trait]
pub trait LogQuery: Send + Sync {
    /// Most recent records first, optionally for one service
    async fn recent(
        &self,
        service_id: Option<ServiceId>,
        limit: usize,
    ) -> Result<Vec<OperationRecord>, DomainError>;

    /// Drop records older than `days` days, returning how many were removed
    async fn prune_older_than(&self, days: u32) -> Result<usize, DomainError>;

    /// Totals over every stored record
    async fn stats(&self) -> Result<LogStats, DomainError>;
}
