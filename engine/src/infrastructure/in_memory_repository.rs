//! In-Memory Service Repository
//! Thread-safe implementation of the ServiceRepository port

use crate::domain::entities::ServiceDefinition;
use crate::domain::ports::{PageRequest, ServiceQuery, ServiceRepository};
use crate::domain::value_objects::ServiceId;
use crate::domain::DomainError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Default)]
struct Table {
    services: BTreeMap<ServiceId, ServiceDefinition>,
    last_id: i64,
}

impl Table {
    fn ensure_unique(&self, candidate: &ServiceDefinition) -> Result<(), DomainError> {
        for existing in self.services.values() {
            if existing.id() == candidate.id() {
                continue;
            }
            if existing.name() == candidate.name() {
                return Err(DomainError::DuplicateName(candidate.name().to_string()));
            }
            if existing.port() == candidate.port() {
                return Err(DomainError::DuplicatePort(candidate.port().value()));
            }
        }
        Ok(())
    }
}

/// Thread-safe in-memory service repository
///
/// Ids are assigned sequentially from 1; a definition that arrives with an
/// unused id (seeded from configuration) keeps it.
#[derive(Clone, Default)]
pub struct InMemoryServiceRepository {
    table: Arc<RwLock<Table>>,
}

impl InMemoryServiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>, DomainError> {
        self.table
            .read()
            .map_err(|_| DomainError::Repository("service table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>, DomainError> {
        self.table
            .write()
            .map_err(|_| DomainError::Repository("service table lock poisoned".to_string()))
    }
}

#[async_trait]
impl ServiceRepository for InMemoryServiceRepository {
    async fn find_by_id(&self, id: ServiceId) -> Result<Option<ServiceDefinition>, DomainError> {
        Ok(self.read()?.services.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<ServiceDefinition>, DomainError> {
        Ok(self
            .read()?
            .services
            .values()
            .find(|s| s.name() == name)
            .cloned())
    }

    async fn list(
        &self,
        query: &ServiceQuery,
        page: Option<PageRequest>,
    ) -> Result<(Vec<ServiceDefinition>, usize), DomainError> {
        let matching: Vec<ServiceDefinition> = self
            .read()?
            .services
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        let total = matching.len();

        let items = match page {
            Some(page) => page.apply(matching),
            None => matching,
        };
        Ok((items, total))
    }

    async fn create(&self, mut definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError> {
        let mut table = self.write()?;

        let id = if definition.id().is_assigned() && !table.services.contains_key(&definition.id()) {
            definition.id()
        } else {
            ServiceId::new(table.last_id + 1)
        };
        definition.assign_id(id);
        table.ensure_unique(&definition)?;

        table.last_id = table.last_id.max(id.value());
        table.services.insert(id, definition.clone());

        info!(
            service_id = %id,
            name = %definition.name(),
            total_services = table.services.len(),
            "Service stored"
        );
        Ok(definition)
    }

    async fn update(&self, mut definition: ServiceDefinition) -> Result<ServiceDefinition, DomainError> {
        let mut table = self.write()?;

        let created_at = table
            .services
            .get(&definition.id())
            .map(|s| s.created_at())
            .ok_or_else(|| DomainError::ServiceNotFound(definition.id().to_string()))?;
        table.ensure_unique(&definition)?;

        definition.touch(created_at);
        table.services.insert(definition.id(), definition.clone());

        debug!(service_id = %definition.id(), "Service replaced");
        Ok(definition)
    }

    async fn delete(&self, id: ServiceId) -> Result<(), DomainError> {
        let mut table = self.write()?;
        if table.services.remove(&id).is_none() {
            return Err(DomainError::ServiceNotFound(id.to_string()));
        }

        info!(
            service_id = %id,
            remaining_services = table.services.len(),
            "Service removed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Port;

    fn definition(name: &str, port: u32) -> ServiceDefinition {
        ServiceDefinition::builder(name, Port::new(port).unwrap(), "./start.sh")
            .work_dir("/srv")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = InMemoryServiceRepository::new();

        let first = repo.create(definition("api", 8080)).await.unwrap();
        let second = repo.create(definition("web", 8081)).await.unwrap();

        assert_eq!(first.id(), ServiceId::new(1));
        assert_eq!(second.id(), ServiceId::new(2));
        assert_eq!(
            repo.get_by_name("web").await.unwrap().port(),
            Port::new(8081).unwrap()
        );
    }

    #[tokio::test]
    async fn test_seeded_id_is_kept() {
        let repo = InMemoryServiceRepository::new();
        let mut seeded = definition("api", 8080);
        seeded.assign_id(ServiceId::new(10));

        let stored = repo.create(seeded).await.unwrap();
        assert_eq!(stored.id(), ServiceId::new(10));

        let next = repo.create(definition("web", 8081)).await.unwrap();
        assert_eq!(next.id(), ServiceId::new(11));
    }

    #[tokio::test]
    async fn test_uniqueness() {
        let repo = InMemoryServiceRepository::new();
        repo.create(definition("api", 8080)).await.unwrap();

        assert!(matches!(
            repo.create(definition("api", 9000)).await,
            Err(DomainError::DuplicateName(_))
        ));
        assert!(matches!(
            repo.create(definition("other", 8080)).await,
            Err(DomainError::DuplicatePort(8080))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let repo = InMemoryServiceRepository::new();
        let stored = repo.create(definition("api", 8080)).await.unwrap();

        let mut changed = ServiceDefinition::builder("api", Port::new(8090).unwrap(), "./run.sh")
            .id(stored.id())
            .work_dir("/srv")
            .build()
            .unwrap();
        changed = repo.update(changed).await.unwrap();

        assert_eq!(changed.created_at(), stored.created_at());
        assert_eq!(changed.port(), Port::new(8090).unwrap());
        assert_eq!(changed.start_cmd(), Some("./run.sh"));
    }

    #[tokio::test]
    async fn test_list_with_query_and_page() {
        let repo = InMemoryServiceRepository::new();
        for (i, name) in ["order-api", "order-worker", "billing"].iter().enumerate() {
            repo.create(definition(name, 8000 + i as u32)).await.unwrap();
        }

        let query = ServiceQuery {
            name_contains: Some("order".to_string()),
        };
        let (items, total) = repo
            .list(&query, Some(PageRequest::new(2, 1)))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name(), "order-worker");
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let repo = InMemoryServiceRepository::new();
        assert!(matches!(
            repo.delete(ServiceId::new(3)).await,
            Err(DomainError::ServiceNotFound(_))
        ));
    }
}
