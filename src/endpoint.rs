//! Route metadata and per-endpoint extraction.
//!
//! A service's routes are described as [`RouteGroup`]s of [`HandlerMeta`]s, filled either
//! by hand or by the [`source`](crate::source) front-end. The [`EndpointExtractor`] turns
//! one handler into an [`EndpointDescriptor`], walking its parameter and response types
//! and, when a [`DescriptionProvider`] is configured, attaching a summary.

use crate::describe::{DescriptionProvider, EndpointContext};
use crate::model::{
    normalize_path, EndpointDescriptor, HttpVerb, ParamSource, ParameterDescriptor, TypeNode,
};
use crate::types::{PrimitiveKind, TypeRef, TypeRegistry};
use crate::walker::TypeGraphWalker;
use log::{debug, warn};

/// Maximum number of envelope layers unwrapped from a response type
pub const MAX_ENVELOPE_DEPTH: usize = 1;

/// Summary attached when the description provider fails
pub const PLACEHOLDER_SUMMARY: &str = "Summary unavailable";
/// Description attached when the description provider fails
pub const PLACEHOLDER_DESCRIPTION: &str = "No description could be generated for this endpoint.";

/// A set of handlers sharing a base path (a controller, an `impl` block or a module)
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGroup {
    pub name: String,
    pub base_path: String,
    pub handlers: Vec<HandlerMeta>,
}

impl RouteGroup {
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: HandlerMeta) -> Self {
        self.handlers.push(handler);
        self
    }
}

/// A single handler method
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerMeta {
    pub method_name: String,
    /// `None` for methods that are not bound to a verb; those are skipped
    pub verb: Option<HttpVerb>,
    pub path: String,
    pub params: Vec<ParamMeta>,
    pub return_type: TypeRef,
}

impl HandlerMeta {
    pub fn new(method_name: impl Into<String>, verb: Option<HttpVerb>, path: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            verb,
            path: path.into(),
            params: Vec::new(),
            return_type: TypeRef::named("()"),
        }
    }

    pub fn with_param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }

    pub fn returning(mut self, return_type: TypeRef) -> Self {
        self.return_type = return_type;
        self
    }
}

/// A handler argument
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMeta {
    pub name: String,
    pub ty: TypeRef,
    /// `None` for arguments that are not API parameters (state, raw requests)
    pub binding: Option<ParamBinding>,
}

impl ParamMeta {
    pub fn new(name: impl Into<String>, ty: TypeRef, binding: Option<ParamBinding>) -> Self {
        Self {
            name: name.into(),
            ty,
            binding,
        }
    }
}

/// How a handler argument is bound to the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBinding {
    Body { required: bool },
    Path,
    Query { required: bool },
}

impl ParamBinding {
    fn source(&self) -> ParamSource {
        match self {
            ParamBinding::Body { .. } => ParamSource::Body,
            ParamBinding::Path => ParamSource::PathSegment,
            ParamBinding::Query { .. } => ParamSource::Query,
        }
    }

    fn required(&self) -> bool {
        match self {
            ParamBinding::Body { required } | ParamBinding::Query { required } => *required,
            ParamBinding::Path => true,
        }
    }
}

/// Extraction options
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Response wrappers whose first argument is the real payload
    pub envelopes: Vec<String>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            envelopes: vec!["Json".to_string(), "ResponseEntity".to_string()],
        }
    }
}

/// Builds endpoint descriptors for the handlers of one service
pub struct EndpointExtractor<'r> {
    walker: TypeGraphWalker<'r>,
    describer: Option<&'r dyn DescriptionProvider>,
    options: ExtractorOptions,
}

impl<'r> EndpointExtractor<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            walker: TypeGraphWalker::new(registry),
            describer: None,
            options: ExtractorOptions::default(),
        }
    }

    pub fn with_describer(mut self, describer: Option<&'r dyn DescriptionProvider>) -> Self {
        self.describer = describer;
        self
    }

    pub fn with_options(mut self, options: ExtractorOptions) -> Self {
        self.options = options;
        self
    }

    /// Describe one handler, or `None` when it is not bound to a verb.
    pub fn extract(&self, group: &RouteGroup, handler: &HandlerMeta) -> Option<EndpointDescriptor> {
        let verb = handler.verb?;
        let path = normalize_path(&format!("{}/{}", group.base_path, handler.path));
        debug!("Extracting {} {} ({}::{})", verb, path, group.name, handler.method_name);

        let parameters: Vec<ParameterDescriptor> = handler
            .params
            .iter()
            .filter_map(|param| {
                let binding = param.binding?;
                Some(ParameterDescriptor {
                    name: param.name.clone(),
                    node: self.parameter_node(&param.ty),
                    source: binding.source(),
                    required: binding.required(),
                })
            })
            .collect();

        let response = self.walker.walk(&self.unwrap_envelope(&handler.return_type));

        let mut endpoint = EndpointDescriptor {
            method_name: handler.method_name.clone(),
            group: group.name.clone(),
            verb,
            path,
            parameters,
            response,
            summary: None,
            description: None,
        };

        if let Some(describer) = self.describer {
            self.enrich(describer, &mut endpoint);
        }

        Some(endpoint)
    }

    fn parameter_node(&self, ty: &TypeRef) -> TypeNode {
        if PrimitiveKind::classify(ty).is_some() {
            TypeNode::primitive(ty.to_string())
        } else {
            self.walker.walk(ty)
        }
    }

    /// Strip up to [`MAX_ENVELOPE_DEPTH`] configured wrappers; deeper ones stay opaque.
    fn unwrap_envelope(&self, ty: &TypeRef) -> TypeRef {
        let mut current = ty;
        for _ in 0..MAX_ENVELOPE_DEPTH {
            if !self.options.envelopes.iter().any(|e| *e == current.name) {
                break;
            }
            match current.first_arg() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current.clone()
    }

    fn enrich(&self, describer: &dyn DescriptionProvider, endpoint: &mut EndpointDescriptor) {
        let context = EndpointContext {
            method_name: endpoint.method_name.clone(),
            verb: endpoint.verb,
            path: endpoint.path.clone(),
            parameters: endpoint
                .parameters
                .iter()
                .map(ParameterDescriptor::signature)
                .collect(),
            response_type: endpoint.response.signature(),
        };

        match describer.describe(&context) {
            Ok(generated) => {
                endpoint.summary = Some(generated.summary);
                endpoint.description = Some(generated.description);
            }
            Err(e) => {
                warn!(
                    "Could not describe {} {}: {}",
                    endpoint.verb, endpoint.path, e
                );
                endpoint.summary = Some(PLACEHOLDER_SUMMARY.to_string());
                endpoint.description = Some(PLACEHOLDER_DESCRIPTION.to_string());
            }
        }
    }
}
