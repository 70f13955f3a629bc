use crate::discovery::ServiceInstance;
use crate::document::ServiceDocument;
use crate::error::{Error, Result};
use futures::future::join_all;
use log::{debug, info, warn};
use serde_json::Value;
use std::time::Duration;

/// Downloads service documents over HTTP
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    docs_path: String,
    timeout: Duration,
}

impl DocumentFetcher {
    /// `docs_path` is appended to each instance's base URL.
    pub fn new(docs_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            docs_path: docs_path.into(),
            timeout,
        }
    }

    pub fn docs_url(&self, instance: &ServiceInstance) -> String {
        format!(
            "{}/{}",
            instance.base_url.trim_end_matches('/'),
            self.docs_path.trim_start_matches('/')
        )
    }

    /// Fetch and parse one document, giving up after the configured timeout.
    pub async fn fetch(&self, instance: &ServiceInstance) -> Result<ServiceDocument> {
        let url = self.docs_url(instance);
        info!("Fetching docs for {} from {}", instance.service_id, url);

        match tokio::time::timeout(self.timeout, self.request(&url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Fetching {} timed out", url);
                Err(Error::Timeout(self.timeout))
            }
        }
    }

    async fn request(&self, url: &str) -> Result<ServiceDocument> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchFailure(format!("HTTP status {}", status.as_u16())));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(Error::MalformedDocument("Received empty response".to_string()));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedDocument(format!("JSON parsing error: {}", e)))?;
        let document = ServiceDocument::from_value(value)?;
        debug!("{} returned {} paths", url, document.paths().len());
        Ok(document)
    }

    /// Fetch every instance concurrently. Results keep the input order.
    pub async fn fetch_all(
        &self,
        instances: &[ServiceInstance],
    ) -> Vec<(String, Result<ServiceDocument>)> {
        join_all(instances.iter().map(|instance| async move {
            (instance.service_id.clone(), self.fetch(instance).await)
        }))
        .await
    }
}
