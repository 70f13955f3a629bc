use crate::describe::DescriptionProvider;
use crate::endpoint::{EndpointExtractor, ExtractorOptions, RouteGroup};
use crate::error::{Error, Result};
use crate::model::{EndpointDescriptor, ParamSource, ServerInfo, ServiceDescription, TypeNode};
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Version string written into generated and unified documents
pub const OPENAPI_VERSION: &str = "3.0.0";

const JSON_MEDIA_TYPE: &str = "application/json";

/// Everything known about one service before document building
#[derive(Debug, Clone, Default)]
pub struct ServiceSource {
    pub groups: Vec<RouteGroup>,
    /// Declared servers; the relative default is used when empty
    pub servers: Vec<ServerInfo>,
    pub registry: TypeRegistry,
}

/// Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One service's self-described endpoint catalog, as exchanged on the wire.
///
/// The JSON object is held verbatim in its original key order. Only `paths` is checked,
/// and it must be an object; everything else passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDocument {
    raw: Map<String, Value>,
}

impl ServiceDocument {
    /// Accept any JSON object carrying a `paths` object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(raw) => Self::from_map(raw),
            other => Err(Error::MalformedDocument(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_map(raw: Map<String, Value>) -> Result<Self> {
        match raw.get("paths") {
            Some(Value::Object(_)) => Ok(Self { raw }),
            Some(other) => Err(Error::MalformedDocument(format!(
                "`paths` must be an object, got {}",
                json_kind(other)
            ))),
            None => Err(Error::MalformedDocument("missing `paths` object".to_string())),
        }
    }

    /// path -> path item, as received
    pub fn paths(&self) -> &Map<String, Value> {
        static NO_PATHS: OnceLock<Map<String, Value>> = OnceLock::new();
        match self.raw.get("paths") {
            Some(Value::Object(paths)) => paths,
            // from_map rejects anything else
            _ => NO_PATHS.get_or_init(Map::new),
        }
    }

    /// The operation under `path` and `verb`, if both exist
    pub fn operation(&self, path: &str, verb: &str) -> Option<&Value> {
        self.paths().get(path).and_then(|item| item.get(verb))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.raw.get(field)
    }

    pub fn openapi(&self) -> Option<&str> {
        self.raw.get("openapi").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.raw)
    }
}

impl Default for ServiceDocument {
    fn default() -> Self {
        let mut raw = Map::new();
        raw.insert("paths".to_string(), Value::Object(Map::new()));
        Self { raw }
    }
}

impl Serialize for ServiceDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServiceDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Map::deserialize(deserializer)?;
        Self::from_map(raw).map_err(de::Error::custom)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Shape of a document this crate generates
#[derive(Debug, Serialize)]
struct GeneratedDocument<'a> {
    openapi: &'static str,
    info: &'a Info,
    servers: &'a [ServerInfo],
    paths: IndexMap<String, IndexMap<String, Value>>,
}

/// Operation object
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<RequestBody>,
    responses: IndexMap<String, Response>,
}

/// Parameter object (path and query)
#[derive(Debug, Serialize)]
struct Parameter {
    name: String,
    #[serde(rename = "in")]
    location: &'static str,
    required: bool,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct RequestBody {
    required: bool,
    content: IndexMap<String, MediaType>,
}

#[derive(Debug, Serialize)]
struct MediaType {
    schema: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<IndexMap<String, MediaType>>,
}

/// Builds a service's document from its route groups
pub struct DocumentBuilder {
    info: Info,
    describer: Option<Box<dyn DescriptionProvider>>,
    options: ExtractorOptions,
}

impl DocumentBuilder {
    /// Create a new DocumentBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing DocumentBuilder");
        Self {
            info: Info {
                title: "Generated API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("API documentation generated from Rust code".to_string()),
            },
            describer: None,
            options: ExtractorOptions::default(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Attach a provider that writes summaries and descriptions
    pub fn with_describer(mut self, describer: Box<dyn DescriptionProvider>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn with_options(mut self, options: ExtractorOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the extractor over every handler of every group.
    pub fn build(&self, service_id: &str, source: &ServiceSource) -> ServiceDescription {
        let extractor = EndpointExtractor::new(&source.registry)
            .with_describer(self.describer.as_deref())
            .with_options(self.options.clone());

        let endpoints: Vec<EndpointDescriptor> = source
            .groups
            .iter()
            .flat_map(|group| {
                group
                    .handlers
                    .iter()
                    .filter_map(|handler| extractor.extract(group, handler))
                    .collect::<Vec<_>>()
            })
            .collect();

        let servers = if source.servers.is_empty() {
            vec![ServerInfo::default_relative()]
        } else {
            source.servers.clone()
        };

        info!(
            "Service {}: {} endpoints in {} groups",
            service_id,
            endpoints.len(),
            source.groups.len()
        );

        ServiceDescription {
            service_id: service_id.to_string(),
            servers,
            endpoints,
        }
    }

    /// Render a description into the wire format.
    pub fn render(&self, description: &ServiceDescription) -> Result<ServiceDocument> {
        let mut paths: IndexMap<String, IndexMap<String, Value>> = IndexMap::new();

        for endpoint in &description.endpoints {
            let path = convert_path_format(&endpoint.path);
            debug!("Rendering {} {}", endpoint.verb, path);
            let operation = serde_json::to_value(Self::operation(endpoint))?;
            paths
                .entry(path)
                .or_default()
                .insert(endpoint.verb.key(), operation);
        }

        let generated = GeneratedDocument {
            openapi: OPENAPI_VERSION,
            info: &self.info,
            servers: &description.servers,
            paths,
        };
        ServiceDocument::from_value(serde_json::to_value(generated)?)
    }

    /// Build and render in one step
    pub fn generate(&self, service_id: &str, source: &ServiceSource) -> Result<ServiceDocument> {
        self.render(&self.build(service_id, source))
    }

    fn operation(endpoint: &EndpointDescriptor) -> Operation {
        let mut parameters = Vec::new();
        let mut request_body = None;

        for param in &endpoint.parameters {
            match param.source {
                ParamSource::Body => {
                    if request_body.is_none() {
                        request_body = Some(RequestBody {
                            required: param.required,
                            content: json_content(&param.node),
                        });
                    }
                }
                ParamSource::PathSegment | ParamSource::Query => parameters.push(Parameter {
                    name: param.name.clone(),
                    location: if param.source == ParamSource::Query {
                        "query"
                    } else {
                        "path"
                    },
                    required: param.required,
                    schema: param.node.to_schema(),
                }),
            }
        }

        let response = Response {
            description: "Successful response".to_string(),
            content: if endpoint.response.is_void() {
                None
            } else {
                Some(json_content(&endpoint.response))
            },
        };
        let mut responses = IndexMap::new();
        responses.insert("200".to_string(), response);

        Operation {
            operation_id: endpoint.method_name.clone(),
            summary: endpoint.summary.clone(),
            description: endpoint.description.clone(),
            tags: vec![endpoint.group.clone()],
            parameters,
            request_body,
            responses,
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn json_content(node: &TypeNode) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(
        JSON_MEDIA_TYPE.to_string(),
        MediaType {
            schema: node.to_schema(),
        },
    );
    content
}

/// Convert `:param` segments to `{param}`
fn convert_path_format(path: &str) -> String {
    path.split('/')
        .map(|part| match part.strip_prefix(':') {
            Some(name) => format!("{{{}}}", name),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::HeuristicDescriber;
    use crate::endpoint::{HandlerMeta, ParamBinding, ParamMeta};
    use crate::model::HttpVerb;
    use crate::types::{MemberDescriptor, TypeDescriptor, TypeRef, ValidationMarker};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ty(src: &str) -> TypeRef {
        TypeRef::parse(src).unwrap()
    }

    fn source() -> ServiceSource {
        let registry = TypeRegistry::new().with(TypeDescriptor::composite(
            "User",
            vec![
                MemberDescriptor::new("id", ty("u64")),
                MemberDescriptor::new("email", ty("String")).with_marker(ValidationMarker::Email {
                    pattern: None,
                }),
            ],
        ));
        let group = RouteGroup::new("UserController", "/users")
            .with_handler(
                HandlerMeta::new("get_user_by_id", Some(HttpVerb::Get), "/:id")
                    .with_param(ParamMeta::new("id", ty("u64"), Some(ParamBinding::Path)))
                    .returning(ty("Json<User>")),
            )
            .with_handler(
                HandlerMeta::new("create_user", Some(HttpVerb::Post), "")
                    .with_param(ParamMeta::new(
                        "user",
                        ty("User"),
                        Some(ParamBinding::Body { required: true }),
                    ))
                    .returning(ty("Json<User>")),
            )
            .with_handler(HandlerMeta::new("delete_user", Some(HttpVerb::Delete), "/:id"))
            .with_handler(HandlerMeta::new("validate", None, ""));
        ServiceSource {
            groups: vec![group],
            servers: Vec::new(),
            registry,
        }
    }

    #[test]
    fn test_new_builder() {
        let builder = DocumentBuilder::new();
        assert_eq!(builder.info.title, "Generated API");
        assert_eq!(builder.info.version, "1.0.0");
        assert!(builder.describer.is_none());
    }

    #[test]
    fn test_build_skips_unbound_handlers_and_defaults_server() {
        let description = DocumentBuilder::new().build("users", &source());
        assert_eq!(description.service_id, "users");
        assert_eq!(description.endpoints.len(), 3);
        assert_eq!(description.servers, vec![ServerInfo::default_relative()]);
    }

    #[test]
    fn test_declared_servers_are_kept() {
        let mut source = source();
        source.servers = vec![ServerInfo::new("https://api.example.com", "Production")];
        let description = DocumentBuilder::new().build("users", &source);
        assert_eq!(description.servers[0].url, "https://api.example.com");
        assert_eq!(description.servers.len(), 1);
    }

    #[test]
    fn test_render_operations() {
        let doc = DocumentBuilder::new()
            .with_info("Users".to_string(), "2.0.0".to_string(), None)
            .generate("users", &source())
            .unwrap();

        assert_eq!(doc.openapi(), Some(OPENAPI_VERSION));
        assert_eq!(doc.get("info").unwrap()["title"], json!("Users"));
        assert_eq!(
            doc.paths().keys().collect::<Vec<_>>(),
            vec!["/users/{id}", "/users"]
        );

        let get = doc.operation("/users/{id}", "get").unwrap();
        assert_eq!(get["operationId"], json!("get_user_by_id"));
        assert_eq!(get["tags"], json!(["UserController"]));
        assert_eq!(
            get["parameters"],
            json!([{"name": "id", "in": "path", "required": true, "schema": "u64"}])
        );
        assert_eq!(
            get["responses"]["200"]["content"]["application/json"]["schema"],
            json!({
                "type": "object",
                "className": "User",
                "required": [],
                "properties": {
                    "id": "u64",
                    "email": {"type": "String", "format": "email"}
                }
            })
        );

        let post = doc.operation("/users", "post").unwrap();
        assert_eq!(post["requestBody"]["required"], json!(true));
        assert!(post.get("parameters").is_none());

        let delete = doc.operation("/users/{id}", "delete").unwrap();
        assert!(delete["responses"]["200"].get("content").is_none());
    }

    #[test]
    fn test_describer_fills_summaries() {
        let doc = DocumentBuilder::new()
            .with_describer(Box::new(HeuristicDescriber))
            .generate("users", &source())
            .unwrap();
        assert_eq!(
            doc.paths()["/users"]["post"]["summary"],
            json!("Creates a new resource.")
        );
    }

    #[test]
    fn test_document_preserves_unknown_fields() {
        let raw = json!({
            "openapi": "3.0.1",
            "info": {"title": "Orders", "contact": {"name": "ops"}},
            "servers": [{"url": "/{stage}", "description": null, "variables": {"stage": {"default": "v1"}}}],
            "paths": {"/a": {"get": {"operationId": "a", "x-custom": 1}}},
            "components": {"schemas": {}}
        });
        let doc: ServiceDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.get("components"), Some(&json!({"schemas": {}})));
        assert_eq!(doc.operation("/a", "get").unwrap()["x-custom"], json!(1));
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            serde_json::to_string(&raw).unwrap()
        );
    }

    #[test]
    fn test_document_without_paths_is_rejected() {
        let result: std::result::Result<ServiceDocument, _> =
            serde_json::from_value(json!({"openapi": "3.0.0"}));
        assert!(result.unwrap_err().to_string().contains("missing `paths`"));

        assert!(matches!(
            ServiceDocument::from_value(json!({"paths": []})),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            ServiceDocument::from_value(json!("paths")),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_generated_document_shape() {
        let doc = DocumentBuilder::new().generate("users", &source()).unwrap();
        let keys: Vec<&str> = doc.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["openapi", "info", "servers", "paths"]);
        assert_eq!(
            doc.get("servers"),
            Some(&json!([{"url": "/", "description": "Default Server (Relative Path)"}]))
        );
    }

    #[test]
    fn test_convert_path_format() {
        assert_eq!(convert_path_format("/users/:id/posts/:post_id"), "/users/{id}/posts/{post_id}");
        assert_eq!(convert_path_format("/users/{id}"), "/users/{id}");
    }
}
