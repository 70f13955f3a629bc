//! Typed, in-memory description of a service's API.
//!
//! These values are produced by the [`walker`](crate::walker) and the
//! [`endpoint`](crate::endpoint) extractor, then rendered to the JSON wire format by the
//! [`document`](crate::document) builder.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Normalized structural representation of a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// A leaf, named by its display name
    Primitive(String),
    Object {
        class_name: String,
        fields: Vec<FieldNode>,
        /// Names of fields carrying a presence marker; always a subset of `fields`
        required: Vec<String>,
    },
    Array(Box<TypeNode>),
    /// Back-reference to a composite that is already an ancestor on the current path
    CircularRef(String),
}

/// One field of an object schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub node: TypeNode,
    pub constraints: Option<Constraints>,
}

/// Normalized validation metadata for a field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.min_length.is_none()
            && self.max_length.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.pattern.is_none()
            && self.format.is_none()
    }

    /// Schema keywords for the constraints that are set
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = self.min_length {
            map.insert("minLength".to_string(), json!(v));
        }
        if let Some(v) = self.max_length {
            map.insert("maxLength".to_string(), json!(v));
        }
        if let Some(v) = self.min {
            map.insert("minimum".to_string(), json!(v));
        }
        if let Some(v) = self.max {
            map.insert("maximum".to_string(), json!(v));
        }
        if let Some(v) = &self.pattern {
            map.insert("pattern".to_string(), json!(v));
        }
        if let Some(v) = &self.format {
            map.insert("format".to_string(), json!(v));
        }
        map
    }
}

impl TypeNode {
    pub fn primitive(name: impl Into<String>) -> Self {
        TypeNode::Primitive(name.into())
    }

    pub fn array(item: TypeNode) -> Self {
        TypeNode::Array(Box::new(item))
    }

    /// Compact textual form used in prompts and parameter signatures
    pub fn signature(&self) -> String {
        match self {
            TypeNode::Primitive(name) => name.clone(),
            TypeNode::Object { class_name, .. } => class_name.clone(),
            TypeNode::Array(item) => format!("List<{}>", item.signature()),
            TypeNode::CircularRef(name) => name.clone(),
        }
    }

    /// Structured JSON rendering
    pub fn to_schema(&self) -> Value {
        match self {
            TypeNode::Primitive(name) => Value::String(name.clone()),
            TypeNode::Object {
                class_name,
                fields,
                required,
            } => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.to_schema());
                }
                json!({
                    "type": "object",
                    "className": class_name,
                    "required": required,
                    "properties": properties,
                })
            }
            TypeNode::Array(item) => json!({
                "type": "array",
                "items": item.to_schema(),
            }),
            TypeNode::CircularRef(name) => json!({
                "type": "object",
                "className": name,
                "circularRef": true,
            }),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeNode::Primitive(name) if name == "()")
    }
}

impl FieldNode {
    /// The field's schema with its constraint keywords merged in
    pub fn to_schema(&self) -> Value {
        let schema = self.node.to_schema();
        let Some(constraints) = &self.constraints else {
            return schema;
        };
        let mut object = match schema {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("type".to_string(), other);
                map
            }
        };
        object.extend(constraints.to_json_map());
        Value::Object(object)
    }
}

/// Collapse repeated slashes, drop a trailing slash and ensure a leading one.
///
/// `"//foo//bar/"` becomes `"/foo/bar"`, the empty path becomes `"/"`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// HTTP verbs a handler can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpVerb {
    /// Parse a verb name, ignoring case
    pub fn parse(name: &str) -> Option<HttpVerb> {
        match name.to_lowercase().as_str() {
            "get" => Some(HttpVerb::Get),
            "post" => Some(HttpVerb::Post),
            "put" => Some(HttpVerb::Put),
            "delete" => Some(HttpVerb::Delete),
            "patch" => Some(HttpVerb::Patch),
            "options" => Some(HttpVerb::Options),
            "head" => Some(HttpVerb::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Head => "HEAD",
        }
    }

    /// Lowercase key used in path items
    pub fn key(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Body,
    PathSegment,
    Query,
}

impl ParamSource {
    pub fn label(&self) -> &'static str {
        match self {
            ParamSource::Body => "Body",
            ParamSource::PathSegment => "PathSegment",
            ParamSource::Query => "Query",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub node: TypeNode,
    pub source: ParamSource,
    pub required: bool,
}

impl ParameterDescriptor {
    /// `"name: Sig (Source)"`
    pub fn signature(&self) -> String {
        format!("{}: {} ({})", self.name, self.node.signature(), self.source.label())
    }
}

/// Everything known about one endpoint of a service
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub method_name: String,
    /// Name of the route group the handler belongs to
    pub group: String,
    pub verb: HttpVerb,
    pub path: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub response: TypeNode,
    pub summary: Option<String>,
    pub description: Option<String>,
}

/// A base server a service declares itself reachable at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl ServerInfo {
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
        }
    }

    /// Used when a service declares no servers
    pub fn default_relative() -> Self {
        Self::new("/", "Default Server (Relative Path)")
    }
}

/// One service's endpoint catalog before rendering
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescription {
    pub service_id: String,
    pub servers: Vec<ServerInfo>,
    pub endpoints: Vec<EndpointDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_node() -> TypeNode {
        TypeNode::Object {
            class_name: "User".to_string(),
            fields: vec![
                FieldNode {
                    name: "name".to_string(),
                    node: TypeNode::primitive("String"),
                    constraints: Some(Constraints {
                        max_length: Some(50),
                        ..Default::default()
                    }),
                },
                FieldNode {
                    name: "tags".to_string(),
                    node: TypeNode::array(TypeNode::primitive("String")),
                    constraints: None,
                },
            ],
            required: vec!["name".to_string()],
        }
    }

    #[test]
    fn test_object_schema_rendering() {
        let schema = user_node().to_schema();
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "className": "User",
                "required": ["name"],
                "properties": {
                    "name": {"type": "String", "maxLength": 50},
                    "tags": {"type": "array", "items": "String"},
                }
            })
        );
    }

    #[test]
    fn test_signature_uses_list_notation() {
        let node = TypeNode::array(user_node());
        assert_eq!(node.signature(), "List<User>");
        assert_eq!(TypeNode::CircularRef("Node".into()).signature(), "Node");
    }

    #[test]
    fn test_circular_ref_rendering() {
        let schema = TypeNode::CircularRef("Node".to_string()).to_schema();
        assert_eq!(schema["circularRef"], json!(true));
        assert_eq!(schema["className"], json!("Node"));
    }

    #[test]
    fn test_constraints_on_object_field_merge_into_object() {
        let field = FieldNode {
            name: "created".to_string(),
            node: TypeNode::primitive("DateTime<Utc>"),
            constraints: Some(Constraints {
                format: Some("date-time".to_string()),
                ..Default::default()
            }),
        };
        assert_eq!(
            field.to_schema(),
            json!({"type": "DateTime<Utc>", "format": "date-time"})
        );
    }

    #[test]
    fn test_http_verb_parse() {
        assert_eq!(HttpVerb::parse("GET"), Some(HttpVerb::Get));
        assert_eq!(HttpVerb::parse("patch"), Some(HttpVerb::Patch));
        assert_eq!(HttpVerb::parse("connect"), None);
        assert_eq!(HttpVerb::Delete.key(), "delete");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("//foo//bar/"), "/foo/bar");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("api/v1/users/{id}"), "/api/v1/users/{id}");
    }

    #[test]
    fn test_empty_constraints() {
        assert!(Constraints::default().is_empty());
        assert!(Constraints::default().to_json_map().is_empty());
    }
}
