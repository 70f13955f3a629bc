//! Rust source front-end.
//!
//! Turns a project directory into a [`ServiceSource`]: the route groups, declared servers
//! and type declarations the document builder works from.

pub mod routes;
pub mod scanner;
pub mod types;

use crate::document::ServiceSource;
use crate::error::Result;
use crate::types::TypeRegistry;
use log::info;
use std::path::Path;

/// Scan, parse and collect everything below `root`
pub fn load_service_source(root: &Path) -> Result<ServiceSource> {
    let scanned = scanner::SourceScanner::new(root.to_path_buf()).scan()?;
    info!(
        "Parsed {} Rust files ({} skipped)",
        scanned.files.len(),
        scanned.warnings.len()
    );

    let mut registry = TypeRegistry::new();
    types::collect_types(&scanned.files, &mut registry);
    let routes = routes::collect_routes(&scanned.files);

    info!(
        "Found {} types and {} route groups",
        registry.len(),
        routes.groups.len()
    );

    Ok(ServiceSource {
        groups: routes.groups,
        servers: routes.servers,
        registry,
    })
}
