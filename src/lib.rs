//! OpenAPI Catalog - API documents from Rust web services, merged across services.
//!
//! The library has two halves.
//!
//! **Generation** turns one service's route handlers and type declarations into a
//! document:
//!
//! 1. [`source`] - scans a project with `syn` and collects route groups and types
//! 2. [`walker`] - expands a type reference into a finite schema tree, cutting cycles
//! 3. [`constraints`] - maps validation markers on fields to schema constraints
//! 4. [`endpoint`] - turns one handler into an [`model::EndpointDescriptor`]
//! 5. [`describe`] - optional summary/description providers
//! 6. [`document`] - assembles and renders a [`document::ServiceDocument`]
//!
//! **Aggregation** merges the documents of many running services:
//!
//! 1. [`discovery`] - where services are and whether they are up
//! 2. [`fetcher`] - concurrent, time-bounded document retrieval
//! 3. [`aggregator`] - re-rooting, tagging and unique operation ids
//! 4. [`catalog`] - discovery, fetch and merge in one call
//!
//! # Example
//!
//! ```no_run
//! use openapi_catalog::{
//!     describe::HeuristicDescriber,
//!     document::DocumentBuilder,
//!     serializer::serialize_yaml,
//!     source::load_service_source,
//! };
//! use std::path::Path;
//!
//! let source = load_service_source(Path::new("./orders-service")).unwrap();
//! let document = DocumentBuilder::new()
//!     .with_describer(Box::new(HeuristicDescriber))
//!     .generate("orders", &source)
//!     .unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! See the [`cli`] module.

pub mod aggregator;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constraints;
pub mod describe;
pub mod discovery;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod serializer;
pub mod source;
pub mod types;
pub mod walker;
