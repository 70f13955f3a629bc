//! Aggregator settings.
//!
//! Read from a YAML file (JSON works too, being a subset):
//!
//! ```yaml
//! title: Shop APIs
//! timeout_secs: 5
//! exclude: [registry, gateway]
//! services:
//!   - service_id: orders
//!     base_url: http://localhost:8081
//!   - service_id: users
//!     base_url: http://localhost:8082
//!     status: down
//! ```

use crate::aggregator::{DocumentAggregator, DEFAULT_EXCLUDED};
use crate::catalog::CatalogService;
use crate::discovery::{ServiceInstance, StaticDiscovery};
use crate::document::Info;
use crate::error::{Error, Result};
use crate::fetcher::DocumentFetcher;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Path of the document endpoint on every service
    pub docs_path: String,
    /// Per-service fetch timeout
    pub timeout_secs: u64,
    /// Service ids never merged, matched case-insensitively
    pub exclude: Vec<String>,
    pub services: Vec<ServiceInstance>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            title: "Aggregated API Documentation".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            docs_path: "/api-docs".to_string(),
            timeout_secs: 10,
            exclude: DEFAULT_EXCLUDED.iter().map(|id| id.to_string()).collect(),
            services: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading aggregator config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: AggregatorConfig =
            serde_yaml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Configuration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.docs_path.trim().is_empty() {
            return Err(Error::Configuration("docs_path cannot be empty".to_string()));
        }
        if let Some(service) = self.services.iter().find(|s| s.service_id.trim().is_empty()) {
            return Err(Error::Configuration(format!(
                "service at {} has no service_id",
                service.base_url
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn info(&self) -> Info {
        Info {
            title: self.title.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
        }
    }

    pub fn aggregator(&self) -> DocumentAggregator {
        DocumentAggregator::new(self.info()).with_excluded(&self.exclude)
    }

    pub fn fetcher(&self) -> DocumentFetcher {
        DocumentFetcher::new(self.docs_path.clone(), self.timeout())
    }

    /// A catalog over the statically configured services
    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(
            Arc::new(StaticDiscovery::new(self.services.clone())),
            self.fetcher(),
            self.aggregator(),
        )
    }
}
