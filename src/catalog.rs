use crate::aggregator::{AggregatedDefinitions, DocumentAggregator};
use crate::discovery::{select_available, ServiceDiscovery};
use crate::fetcher::DocumentFetcher;
use log::{error, info};
use std::sync::Arc;

/// Discovers services, fetches their documents and merges them.
pub struct CatalogService {
    discovery: Arc<dyn ServiceDiscovery>,
    fetcher: DocumentFetcher,
    aggregator: DocumentAggregator,
}

impl CatalogService {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        fetcher: DocumentFetcher,
        aggregator: DocumentAggregator,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            aggregator,
        }
    }

    /// Build a fresh catalog.
    ///
    /// Always succeeds: a failing discovery yields an empty catalog and a failing
    /// service only fills its own error slot.
    pub async fn definitions(&self) -> AggregatedDefinitions {
        let instances = match self.discovery.snapshot().await {
            Ok(instances) => instances,
            Err(e) => {
                error!("Service discovery failed: {}", e);
                Vec::new()
            }
        };

        let targets: Vec<_> = select_available(instances)
            .into_iter()
            .filter(|instance| !self.aggregator.is_excluded(&instance.service_id))
            .collect();
        info!("Fetching definitions from {} services", targets.len());

        let results = self.fetcher.fetch_all(&targets).await;
        let definitions = self.aggregator.aggregate(results);
        info!(
            "Catalog has {} paths from {} services",
            definitions.unified_spec.paths.len(),
            definitions.individual_specs.len()
        );
        definitions
    }
}
