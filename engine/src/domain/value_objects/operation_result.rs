//! Per-service outcome of a batch and the aggregate report

use crate::domain::value_objects::ServiceId;
use crate::domain::DomainError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub service_id: ServiceId,
    pub success: bool,
    /// Set when the service was already in the requested state
    pub skipped: bool,
    pub output: String,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

impl OperationResult {
    pub fn from_outcome(service_id: ServiceId, outcome: Result<String, DomainError>) -> Self {
        match outcome {
            Ok(output) => Self::succeeded(service_id, output),
            Err(e) => Self::failed(service_id, &e),
        }
    }

    pub fn succeeded(service_id: ServiceId, output: String) -> Self {
        Self {
            service_id,
            success: true,
            skipped: false,
            output,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(service_id: ServiceId, error: &DomainError) -> Self {
        Self {
            service_id,
            success: false,
            skipped: false,
            output: error.output().unwrap_or_default().to_string(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn skipped(service_id: ServiceId, reason: impl Into<String>) -> Self {
        Self {
            service_id,
            success: true,
            skipped: true,
            output: reason.into(),
            error: None,
            error_kind: None,
        }
    }
}

/// Aggregate outcome of one batch call; `results` follows input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub operation: String,
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<OperationResult>,
}

impl BatchReport {
    pub fn new(operation: impl Into<String>, results: Vec<OperationResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            operation: operation.into(),
            total: results.len(),
            success_count,
            failed_count: results.len() - success_count,
            results,
        }
    }
}
