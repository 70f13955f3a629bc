//! Merging of many service documents into one catalog.
//!
//! Every service's paths are re-rooted under `/{service_id}`, every operation is tagged
//! with the service id and gets an operationId that is unique across the catalog. A
//! service that failed to deliver a document only shows up as an `{"error": ...}` slot
//! in [`AggregatedDefinitions::individual_specs`]; it never aborts the batch.

use crate::document::{Info, ServiceDocument, OPENAPI_VERSION};
use crate::error::Result;
use crate::model::normalize_path;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Services skipped unless configured otherwise
pub const DEFAULT_EXCLUDED: &[&str] = &["registry"];

/// The merged, cross-service catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDocument {
    pub openapi: String,
    pub info: Info,
    pub paths: IndexMap<String, IndexMap<String, Value>>,
}

/// Per-service entry next to the unified document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSlot {
    /// The document exactly as the service delivered it
    Document(ServiceDocument),
    Error { error: String },
}

/// Unified document plus the raw per-service documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedDefinitions {
    pub unified_spec: UnifiedDocument,
    pub individual_specs: IndexMap<String, RawSlot>,
}

/// Folds per-service results into [`AggregatedDefinitions`]
#[derive(Debug, Clone)]
pub struct DocumentAggregator {
    info: Info,
    /// Lowercased service ids that are never merged
    excluded: HashSet<String>,
}

impl DocumentAggregator {
    pub fn new(info: Info) -> Self {
        Self {
            info,
            excluded: DEFAULT_EXCLUDED.iter().map(|id| id.to_string()).collect(),
        }
    }

    /// Replace the exclusion list; matching ignores case.
    pub fn with_excluded<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded = ids.into_iter().map(|id| id.as_ref().to_lowercase()).collect();
        self
    }

    pub fn is_excluded(&self, service_id: &str) -> bool {
        self.excluded.contains(&service_id.to_lowercase())
    }

    /// Merge the results in input order. Never fails.
    pub fn aggregate(&self, inputs: Vec<(String, Result<ServiceDocument>)>) -> AggregatedDefinitions {
        let mut merge = MergeState::default();
        let mut individual_specs = IndexMap::new();

        for (service_id, result) in inputs {
            if self.is_excluded(&service_id) {
                debug!("Skipping excluded service {}", service_id);
                continue;
            }
            match result {
                Ok(document) => {
                    merge.merge_service(&service_id, &document);
                    info!(
                        "Merged {} paths from {}",
                        document.paths().len(),
                        service_id
                    );
                    individual_specs.insert(service_id, RawSlot::Document(document));
                }
                Err(e) => {
                    warn!("No document for service {}: {}", service_id, e);
                    individual_specs.insert(
                        service_id,
                        RawSlot::Error {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        AggregatedDefinitions {
            unified_spec: UnifiedDocument {
                openapi: OPENAPI_VERSION.to_string(),
                info: self.info.clone(),
                paths: merge.paths,
            },
            individual_specs,
        }
    }
}

impl Default for DocumentAggregator {
    fn default() -> Self {
        Self::new(Info {
            title: "Aggregated API Documentation".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        })
    }
}

#[derive(Default)]
struct MergeState {
    paths: IndexMap<String, IndexMap<String, Value>>,
    operation_ids: HashSet<String>,
}

impl MergeState {
    fn merge_service(&mut self, service_id: &str, document: &ServiceDocument) {
        for (original_path, item) in document.paths() {
            let merged_path = normalize_path(&format!("/{}{}", service_id, original_path));
            let Value::Object(verbs) = item else {
                debug!("Dropping non-object path item {}", merged_path);
                continue;
            };

            for (verb, operation) in verbs {
                let Value::Object(operation) = operation else {
                    debug!("Dropping non-object operation {} {}", verb, merged_path);
                    continue;
                };
                let mut operation = operation.clone();

                let base_id = match operation.get("operationId") {
                    Some(Value::String(original)) => format!("{}_{}", service_id, original),
                    _ => format!("{}_{}{}", service_id, verb, sanitize(&merged_path)),
                };

                // the operation being replaced gives up its id first
                if let Some(Value::Object(previous)) = self
                    .paths
                    .get(&merged_path)
                    .and_then(|item| item.get(verb))
                {
                    warn!("{} {} is defined twice, keeping the later one", verb, merged_path);
                    if let Some(Value::String(id)) = previous.get("operationId") {
                        self.operation_ids.remove(id);
                    }
                }

                let operation_id = self.unique_id(base_id);
                operation.insert("operationId".to_string(), Value::String(operation_id));
                operation.insert(
                    "tags".to_string(),
                    Value::Array(vec![Value::String(service_id.to_string())]),
                );

                self.paths
                    .entry(merged_path.clone())
                    .or_default()
                    .insert(verb.clone(), Value::Object(operation));
            }
        }
    }

    /// Claim `base`, or the first free `base_2`, `base_3`, ...
    fn unique_id(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.operation_ids.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.operation_ids.insert(candidate.clone());
        candidate
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`
fn sanitize(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
