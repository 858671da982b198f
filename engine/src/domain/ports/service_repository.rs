//! Repository port for service definitions
//! Uniqueness of names and ports is enforced by implementations

use crate::domain::entities::ServiceDefinition;
use crate::domain::value_objects::ServiceId;
use crate::domain::DomainError;
use async_trait::async_trait;

/// Filter applied by the repository itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceQuery {
    /// Case-insensitive substring match on the name
    pub name_contains: Option<String>,
}

impl ServiceQuery {
    pub fn matches(&self, definition: &ServiceDefinition) -> bool {
        match &self.name_contains {
            Some(needle) if !needle.is_empty() => definition
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    /// Slice `items` down to this page
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.page_size)
            .collect()
    }
}

/// Repository port for service persistence
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// Find a service by ID
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<ServiceDefinition>, DomainError>;

    /// Find a service by name
    async fn find_by_name(&self, name: &str) -> Result<Option<ServiceDefinition>, DomainError>;

    /// List services ordered by id, returning the requested page and the
    /// number of matches before paging
    async fn list(
        &self,
        query: &ServiceQuery,
        page: Option<PageRequest>,
    ) -> Result<(Vec<ServiceDefinition>, usize), DomainError>;

    /// Store a new definition and return it with its assigned id
    async fn create(&self, definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError>;

    /// Replace an existing definition
    async fn update(&self, definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError>;

    /// Remove a definition
    async fn delete(&self, id: ServiceId) -> Result<(), DomainError>;

    /// Find a service by ID, failing with `ServiceNotFound`
    async fn get_by_id(&self, id: ServiceId) -> Result<ServiceDefinition, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::ServiceNotFound(id.to_string()))
    }

    /// Find a service by name, failing with `ServiceNotFound`
    async fn get_by_name(&self, name: &str) -> Result<ServiceDefinition, DomainError> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| DomainError::ServiceNotFound(name.to_string()))
    }

    /// Every definition, ordered by id
    async fn find_all(&self) -> Result<Vec<ServiceDefinition>, DomainError> {
        let (items, _) = self.list(&ServiceQuery::default(), None).await?;
        Ok(items)
    }
}
