//! Service instance records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::InstanceConfig;

/// One addressable backend deployment of a service type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// Unique name; also the key for circuit and metrics state.
    pub name: String,
    pub service_type: String,
    pub base_url: Url,
    /// Encrypted credential. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub credential: String,
    pub region: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request. `credential` is plaintext here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstance {
    pub name: String,
    pub service_type: String,
    pub base_url: String,
    pub credential: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl From<&InstanceConfig> for NewInstance {
    fn from(config: &InstanceConfig) -> Self {
        Self {
            name: config.name.clone(),
            service_type: config.service_type.clone(),
            base_url: config.base_url.clone(),
            credential: config.credential.clone(),
            region: config.region.clone(),
            priority: config.priority,
            is_active: config.active,
            metadata: config.metadata.clone(),
        }
    }
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceUpdate {
    pub service_type: Option<String>,
    pub base_url: Option<String>,
    /// Plaintext; re-encrypted before storage.
    pub credential: Option<String>,
    pub region: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Store-side filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceQuery {
    pub service_type: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

impl InstanceQuery {
    pub fn active_of_type(service_type: &str) -> Self {
        Self {
            service_type: Some(service_type.to_string()),
            region: None,
            active_only: true,
        }
    }

    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn matches(&self, instance: &ServiceInstance) -> bool {
        if self.active_only && !instance.is_active {
            return false;
        }
        if let Some(service_type) = &self.service_type {
            if &instance.service_type != service_type {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if instance.region.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        true
    }
}
