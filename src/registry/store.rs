//! Durable storage behind the registry.
//!
//! The registry treats the store as the source of truth. The in-memory
//! implementation keeps insertion order, which is the tie-break order for
//! equal priorities.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{RegistryError, RegistryResult};
use super::instance::{InstanceQuery, ServiceInstance};

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert a new record. Names are unique.
    async fn insert(&self, instance: ServiceInstance) -> RegistryResult<()>;

    /// Replace the record with the same name.
    async fn replace(&self, instance: ServiceInstance) -> RegistryResult<()>;

    async fn find_by_name(&self, name: &str) -> RegistryResult<Option<ServiceInstance>>;

    /// Matching records in natural (insertion) order.
    async fn list(&self, query: &InstanceQuery) -> RegistryResult<Vec<ServiceInstance>>;
}

#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    instances: RwLock<Vec<ServiceInstance>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn insert(&self, instance: ServiceInstance) -> RegistryResult<()> {
        let mut instances = self.instances.write();
        if instances.iter().any(|i| i.name == instance.name) {
            return Err(RegistryError::Duplicate(instance.name));
        }
        instances.push(instance);
        Ok(())
    }

    async fn replace(&self, instance: ServiceInstance) -> RegistryResult<()> {
        let mut instances = self.instances.write();
        match instances.iter_mut().find(|i| i.name == instance.name) {
            Some(slot) => {
                *slot = instance;
                Ok(())
            }
            None => Err(RegistryError::NotFound(instance.name)),
        }
    }

    async fn find_by_name(&self, name: &str) -> RegistryResult<Option<ServiceInstance>> {
        Ok(self.instances.read().iter().find(|i| i.name == name).cloned())
    }

    async fn list(&self, query: &InstanceQuery) -> RegistryResult<Vec<ServiceInstance>> {
        Ok(self
            .instances
            .read()
            .iter()
            .filter(|i| query.matches(i))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use url::Url;

    fn instance(name: &str) -> ServiceInstance {
        let now = Utc::now();
        ServiceInstance {
            name: name.to_string(),
            service_type: "order-gateway".to_string(),
            base_url: Url::parse("http://127.0.0.1:9100").unwrap(),
            credential: String::new(),
            region: None,
            priority: 0,
            is_active: true,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_unique_names() {
        let store = InMemoryRegistryStore::new();
        store.insert(instance("a")).await.unwrap();
        let err = store.insert(instance("a")).await.unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "a"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let store = InMemoryRegistryStore::new();
        for name in ["c", "a", "b"] {
            store.insert(instance(name)).await.unwrap();
        }
        let names: Vec<_> = store
            .list(&InstanceQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_replace_missing() {
        let store = InMemoryRegistryStore::new();
        assert!(matches!(
            store.replace(instance("ghost")).await,
            Err(RegistryError::NotFound(_))
        ));
    }
}
