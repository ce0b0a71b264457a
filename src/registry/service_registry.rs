//! Instance directory with type/region filtering and priority ordering.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use url::Url;

use super::error::{RegistryError, RegistryResult};
use super::instance::{InstanceQuery, InstanceUpdate, NewInstance, ServiceInstance};
use super::store::RegistryStore;
use crate::cache::{get_json, set_json, SharedCache};
use crate::config::InstanceConfig;
use crate::resilience::CircuitBreaker;
use crate::security::{CredentialCipher, CredentialError};

/// Cache key of the name → base URL directory of active instances.
pub const DIRECTORY_KEY: &str = "registry:service-urls";

type Directory = BTreeMap<String, String>;

pub struct ServiceRegistry {
    store: Arc<dyn RegistryStore>,
    cipher: Arc<dyn CredentialCipher>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<dyn SharedCache>,
    directory_ttl: Duration,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("cache", &self.cache.provider_name())
            .field("directory_ttl", &self.directory_ttl)
            .finish_non_exhaustive()
    }
}

impl ServiceRegistry {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        cipher: Arc<dyn CredentialCipher>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<dyn SharedCache>,
        directory_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cipher,
            breaker,
            cache,
            directory_ttl,
        }
    }

    /// Active instances of a type, highest priority first.
    pub async fn instances_by_type(&self, service_type: &str) -> RegistryResult<Vec<ServiceInstance>> {
        let instances = self.store.list(&InstanceQuery::active_of_type(service_type)).await?;
        Ok(by_priority(instances))
    }

    pub async fn instances_by_type_and_region(
        &self,
        service_type: &str,
        region: &str,
    ) -> RegistryResult<Vec<ServiceInstance>> {
        let query = InstanceQuery::active_of_type(service_type).in_region(region);
        Ok(by_priority(self.store.list(&query).await?))
    }

    /// Region-filtered instances, or every instance of the type when the
    /// region has none (or no region is given).
    pub async fn candidates(&self, service_type: &str, region: Option<&str>) -> RegistryResult<Vec<ServiceInstance>> {
        if let Some(region) = region {
            let regional = self.instances_by_type_and_region(service_type, region).await?;
            if !regional.is_empty() {
                return Ok(regional);
            }
            tracing::debug!(service_type = %service_type, region = %region, "No instances in preferred region, using all");
        }
        self.instances_by_type(service_type).await
    }

    /// Highest-priority candidate whose circuit allows a call.
    pub async fn best_instance(
        &self,
        service_type: &str,
        region: Option<&str>,
    ) -> RegistryResult<Option<ServiceInstance>> {
        for instance in self.candidates(service_type, region).await? {
            if self.breaker.can_call(&instance.name).await {
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    /// Any-state listing for admin views.
    pub async fn list(&self, query: &InstanceQuery) -> RegistryResult<Vec<ServiceInstance>> {
        Ok(by_priority(self.store.list(query).await?))
    }

    pub async fn exists(&self, name: &str) -> RegistryResult<bool> {
        Ok(self.store.find_by_name(name).await?.is_some())
    }

    pub async fn register_instance(&self, new: NewInstance) -> RegistryResult<ServiceInstance> {
        let base_url = parse_base_url(&new.name, &new.base_url)?;
        if self.exists(&new.name).await? {
            return Err(RegistryError::Duplicate(new.name));
        }

        let now = Utc::now();
        let instance = ServiceInstance {
            credential: self.cipher.encrypt(&new.credential)?,
            name: new.name,
            service_type: new.service_type,
            base_url,
            region: new.region,
            priority: new.priority,
            is_active: new.is_active,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(instance.clone()).await?;

        tracing::info!(
            instance = %instance.name,
            service_type = %instance.service_type,
            region = ?instance.region,
            priority = instance.priority,
            "Registered service instance"
        );
        self.refresh_directory().await;
        Ok(instance)
    }

    pub async fn update_instance(&self, name: &str, update: InstanceUpdate) -> RegistryResult<ServiceInstance> {
        let mut instance = self
            .store
            .find_by_name(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if let Some(base_url) = update.base_url {
            instance.base_url = parse_base_url(name, &base_url)?;
        }
        if let Some(credential) = update.credential {
            instance.credential = self.cipher.encrypt(&credential)?;
        }
        if let Some(service_type) = update.service_type {
            instance.service_type = service_type;
        }
        if let Some(region) = update.region {
            instance.region = Some(region);
        }
        if let Some(priority) = update.priority {
            instance.priority = priority;
        }
        if let Some(is_active) = update.is_active {
            instance.is_active = is_active;
        }
        if let Some(metadata) = update.metadata {
            instance.metadata = metadata;
        }
        instance.updated_at = Utc::now();

        self.store.replace(instance.clone()).await?;
        tracing::info!(instance = %name, "Updated service instance");
        self.refresh_directory().await;
        Ok(instance)
    }

    /// Mark inactive. Deactivating an inactive instance is a no-op.
    pub async fn deactivate_instance(&self, name: &str) -> RegistryResult<ServiceInstance> {
        self.update_instance(
            name,
            InstanceUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    /// Base URL of an active instance, served from the cached directory.
    pub async fn service_url(&self, name: &str) -> RegistryResult<Url> {
        if let Some(directory) = get_json::<Directory>(self.cache.as_ref(), DIRECTORY_KEY).await {
            if let Some(url) = directory.get(name) {
                if let Ok(url) = Url::parse(url) {
                    return Ok(url);
                }
            }
        }

        let instance = self.active_instance(name).await?;
        self.refresh_directory().await;
        Ok(instance.base_url)
    }

    /// Decrypted credential of an active instance.
    pub async fn credential(&self, name: &str) -> RegistryResult<String> {
        let instance = self.active_instance(name).await?;
        Ok(self.decrypt_credential(&instance)?)
    }

    pub fn decrypt_credential(&self, instance: &ServiceInstance) -> Result<String, CredentialError> {
        self.cipher.decrypt(&instance.credential)
    }

    /// Register configured instances, leaving already-known names alone.
    pub async fn seed(&self, instances: &[InstanceConfig]) -> RegistryResult<usize> {
        let mut added = 0;
        for config in instances {
            match self.register_instance(NewInstance::from(config)).await {
                Ok(_) => added += 1,
                Err(RegistryError::Duplicate(name)) => {
                    tracing::debug!(instance = %name, "Seed instance already registered");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    async fn active_instance(&self, name: &str) -> RegistryResult<ServiceInstance> {
        self.store
            .find_by_name(name)
            .await?
            .filter(|i| i.is_active)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Rebuild the cached directory from the store.
    async fn refresh_directory(&self) {
        let active = InstanceQuery {
            active_only: true,
            ..Default::default()
        };
        match self.store.list(&active).await {
            Ok(instances) => {
                let directory: Directory = instances
                    .into_iter()
                    .map(|i| (i.name, i.base_url.to_string()))
                    .collect();
                set_json(self.cache.as_ref(), DIRECTORY_KEY, &directory, self.directory_ttl).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not rebuild service directory, dropping cached copy");
                if let Err(e) = self.cache.delete(DIRECTORY_KEY).await {
                    tracing::warn!(error = %e, "Cache delete failed");
                }
            }
        }
    }
}

/// Stable sort, so equal priorities keep store order.
fn by_priority(mut instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
    instances.sort_by(|a, b| b.priority.cmp(&a.priority));
    instances
}

fn parse_base_url(name: &str, raw: &str) -> RegistryResult<Url> {
    let url = Url::parse(raw).map_err(|e| RegistryError::InvalidUrl {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidUrl {
            name: name.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}
