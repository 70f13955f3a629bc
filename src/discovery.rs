//! Service discovery port.
//!
//! The catalog never owns the registry of running services; it asks a
//! [`ServiceDiscovery`] for a point-in-time snapshot on every aggregation.

use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Health of a registered instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

/// One registered instance of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub base_url: String,
    #[serde(default)]
    pub status: InstanceStatus,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            base_url: base_url.into(),
            status: InstanceStatus::Up,
        }
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_available(&self) -> bool {
        self.status == InstanceStatus::Up
    }
}

/// Snapshot of reachable services
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Every known instance, in registry order
    async fn snapshot(&self) -> Result<Vec<ServiceInstance>>;
}

/// Discovery backed by a fixed list, usually read from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    instances: Vec<ServiceInstance>,
}

impl StaticDiscovery {
    pub fn new(instances: Vec<ServiceInstance>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn snapshot(&self) -> Result<Vec<ServiceInstance>> {
        Ok(self.instances.clone())
    }
}

/// Pick the first available instance of each service, with ids lowercased.
pub fn select_available(instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
    let mut seen = HashSet::new();
    instances
        .into_iter()
        .filter_map(|mut instance| {
            if !instance.is_available() {
                debug!(
                    "Skipping {} at {} ({:?})",
                    instance.service_id, instance.base_url, instance.status
                );
                return None;
            }
            instance.service_id = instance.service_id.to_lowercase();
            seen.insert(instance.service_id.clone()).then_some(instance)
        })
        .collect()
}
