//! Service Catalog
//!
//! CRUD over service definitions plus status queries that join each
//! definition with one port snapshot. Reads share the read side of the
//! lock; writes take the write side.

use crate::constants::catalog;
use crate::domain::entities::ServiceDefinition;
use crate::domain::ports::{PageRequest, ServiceQuery, ServiceRepository};
use crate::domain::services::PortMonitor;
use crate::domain::value_objects::{ServiceId, ServiceStatus};
use crate::domain::DomainError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Filter for status listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFilter {
    pub name_contains: Option<String>,
    /// Keep only running (`Some(true)`) or stopped (`Some(false)`) services
    pub running: Option<bool>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ServiceFilter {
    fn default() -> Self {
        Self {
            name_contains: None,
            running: None,
            page: catalog::DEFAULT_PAGE,
            page_size: catalog::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceList {
    pub items: Vec<ServiceStatus>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub total: usize,
    pub running: usize,
    pub stopped: usize,
}

pub struct ServiceCatalog {
    repository: Arc<dyn ServiceRepository>,
    monitor: Arc<PortMonitor>,
    lock: RwLock<()>,
}

impl ServiceCatalog {
    pub fn new(repository: Arc<dyn ServiceRepository>, monitor: Arc<PortMonitor>) -> Self {
        Self {
            repository,
            monitor,
            lock: RwLock::new(()),
        }
    }

    pub async fn create(&self, definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError> {
        let _guard = self.lock.write().await;
        definition.validate()?;

        let created = self.repository.create(definition).await?;
        info!(
            service_id = %created.id(),
            name = %created.name(),
            port = created.port().value(),
            "Service created"
        );
        Ok(created)
    }

    pub async fn update(&self, definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError> {
        let _guard = self.lock.write().await;
        definition.validate()?;
        self.repository.get_by_id(definition.id()).await?;

        let updated = self.repository.update(definition).await?;
        info!(service_id = %updated.id(), name = %updated.name(), "Service updated");
        Ok(updated)
    }

    /// Remove a definition; refused while its port is in use
    pub async fn delete(&self, id: ServiceId) -> Result<(), DomainError> {
        let _guard = self.lock.write().await;
        let definition = self.repository.get_by_id(id).await?;

        if self.monitor.is_listening(definition.port()).await {
            return Err(DomainError::ServiceAlreadyRunning(
                definition.name().to_string(),
            ));
        }

        self.repository.delete(id).await?;
        info!(service_id = %id, name = %definition.name(), "Service deleted");
        Ok(())
    }

    pub async fn get(&self, id: ServiceId) -> Result<ServiceDefinition, DomainError> {
        let _guard = self.lock.read().await;
        self.repository.get_by_id(id).await
    }

    pub async fn get_status(&self, id: ServiceId) -> Result<ServiceStatus, DomainError> {
        let _guard = self.lock.read().await;
        let definition = self.repository.get_by_id(id).await?;
        let snapshot = self.monitor.snapshot().await?;
        Ok(ServiceStatus::from_snapshot(definition, &snapshot))
    }

    pub async fn list_with_status(&self, filter: &ServiceFilter) -> Result<ServiceList, DomainError> {
        let _guard = self.lock.read().await;
        let page = PageRequest::new(filter.page, filter.page_size);
        let query = ServiceQuery {
            name_contains: filter.name_contains.clone(),
        };
        let snapshot = self.monitor.snapshot().await?;

        let (items, total) = match filter.running {
            // Paging happens in the repository
            None => {
                let (definitions, total) = self.repository.list(&query, Some(page)).await?;
                let items = definitions
                    .into_iter()
                    .map(|d| ServiceStatus::from_snapshot(d, &snapshot))
                    .collect();
                (items, total)
            }
            // State is only known after the join, so page here
            Some(running) => {
                let (definitions, _) = self.repository.list(&query, None).await?;
                let matching: Vec<ServiceStatus> = definitions
                    .into_iter()
                    .map(|d| ServiceStatus::from_snapshot(d, &snapshot))
                    .filter(|s| s.running == running)
                    .collect();
                let total = matching.len();
                (page.apply(matching), total)
            }
        };

        Ok(ServiceList {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    pub async fn summary(&self) -> Result<ServiceSummary, DomainError> {
        let _guard = self.lock.read().await;
        let definitions = self.repository.find_all().await?;
        let snapshot = self.monitor.snapshot().await?;

        let running = definitions
            .iter()
            .filter(|d| snapshot.is_listening(d.port().value()))
            .count();
        Ok(ServiceSummary {
            total: definitions.len(),
            running,
            stopped: definitions.len() - running,
        })
    }
}
