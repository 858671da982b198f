//! OperationRecord Value Object
//!
//! Immutable log entry describing one attempted lifecycle operation.

use crate::constants::log_pipeline::TRUNCATION_MARKER;
use crate::domain::value_objects::ServiceId;
use crate::domain::DomainError;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub service_id: ServiceId,
    pub operation: String,
    pub status: OperationStatus,
    pub output: String,
    pub error_message: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl OperationRecord {
    pub fn success(
        service_id: ServiceId,
        operation: impl Into<String>,
        output: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            service_id,
            operation: operation.into(),
            status: OperationStatus::Success,
            output: output.into(),
            error_message: String::new(),
            duration_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Record a failure, keeping any command output the error preserved
    pub fn failure(
        service_id: ServiceId,
        operation: impl Into<String>,
        error: &DomainError,
        elapsed: Duration,
    ) -> Self {
        Self {
            service_id,
            operation: operation.into(),
            status: OperationStatus::Failed,
            output: error.output().unwrap_or_default().to_string(),
            error_message: error.to_string(),
            duration_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    /// Cap output and error message sizes before the record is persisted
    pub fn truncated(mut self, max_output: usize, max_error: usize) -> Self {
        self.output = truncate_field(self.output, max_output);
        self.error_message = truncate_field(self.error_message, max_error);
        self
    }
}

/// Aggregate counts over stored operation records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total: usize,
    /// Records whose timestamp falls on `today` in local time
    pub today: usize,
    pub success: usize,
    pub failed: usize,
    pub by_operation: BTreeMap<String, usize>,
}

impl LogStats {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a OperationRecord>, today: NaiveDate) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            if record.timestamp.with_timezone(&Local).date_naive() == today {
                stats.today += 1;
            }
            match record.status {
                OperationStatus::Success => stats.success += 1,
                OperationStatus::Failed => stats.failed += 1,
            }
            *stats
                .by_operation
                .entry(record.operation.clone())
                .or_default() += 1;
        }
        stats
    }
}

/// Cut `value` to at most `max` bytes on a char boundary, then append the marker
pub fn truncate_field(value: String, max: usize) -> String {
    if value.len() <= max {
        return value;
    }
    let mut cut = max;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
    truncated.push_str(&value[..cut]);
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
