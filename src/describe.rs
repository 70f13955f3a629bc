//! Text descriptions for endpoints.
//!
//! A [`DescriptionProvider`] turns an [`EndpointContext`] into a short summary and a longer
//! description. Providers are optional and injected into the
//! [`EndpointExtractor`](crate::endpoint::EndpointExtractor); a failing provider never
//! fails extraction.
//!
//! - [`HeuristicDescriber`]: rule-based, derived from the handler's name
//! - [`GeminiDescriber`]: calls a Gemini-compatible `generateContent` API

use crate::error::{Error, Result};
use crate::model::HttpVerb;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Everything a provider gets to see about one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointContext {
    pub method_name: String,
    pub verb: HttpVerb,
    pub path: String,
    /// Parameter signatures, `"name: Sig (Source)"`
    pub parameters: Vec<String>,
    pub response_type: String,
}

/// Provider output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub summary: String,
    pub description: String,
}

/// Generates human-readable text for an endpoint.
///
/// Called synchronously once per endpoint during document building.
pub trait DescriptionProvider: Send + Sync {
    fn describe(&self, context: &EndpointContext) -> Result<EndpointSummary>;
}

/// Rule-based provider keyed on the handler name's leading verb
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDescriber;

impl DescriptionProvider for HeuristicDescriber {
    fn describe(&self, context: &EndpointContext) -> Result<EndpointSummary> {
        // `get_user_by_id` and `getUserById` both become `getuserbyid`
        let name: String = context
            .method_name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| name.starts_with(p));

        let (summary, description) = if starts(&["get", "find", "list"]) {
            let summary = if name.contains("byid") {
                "Retrieves a specific resource by its ID."
            } else if name.contains("all") || name.starts_with("list") {
                "Retrieves a list of all resources."
            } else {
                "Retrieves a resource."
            };
            (summary.to_string(), format!("{} This is a GET operation.", summary))
        } else if starts(&["create", "add"]) {
            (
                "Creates a new resource.".to_string(),
                "Creates a new resource, typically using the provided request body. This is a POST operation."
                    .to_string(),
            )
        } else if starts(&["update", "modify"]) {
            (
                "Updates an existing resource.".to_string(),
                "Updates an existing resource, often identified by an ID in the path. This is a PUT or PATCH operation."
                    .to_string(),
            )
        } else if starts(&["delete", "remove"]) {
            (
                "Deletes a resource.".to_string(),
                "Deletes an existing resource, typically identified by an ID in the path. This is a DELETE operation."
                    .to_string(),
            )
        } else {
            (
                format!("A default summary for {}", context.method_name),
                format!(
                    "This endpoint {} operates on the path {}",
                    context.method_name, context.path
                ),
            )
        };

        Ok(EndpointSummary {
            summary,
            description,
        })
    }
}

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1/models";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
const GEMINI_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider backed by a Gemini-compatible `generateContent` endpoint.
///
/// Holds one blocking client for all calls, so it must not be created, called or dropped
/// on an async runtime thread.
#[derive(Debug, Clone)]
pub struct GeminiDescriber {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiDescriber {
    /// Fails with a configuration error when the key is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "Gemini API key cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            client: build_client(GEMINI_TIMEOUT)?,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            timeout: GEMINI_TIMEOUT,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the client with one using `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint_url(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| Error::Configuration(format!("cannot build HTTP client: {}", err)))
}

impl DescriptionProvider for GeminiDescriber {
    fn describe(&self, context: &EndpointContext) -> Result<EndpointSummary> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(context),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
            },
        };

        debug!("Requesting description for {} {}", context.verb, context.path);

        let response = self
            .client
            .post(self.endpoint_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .map_err(|err| Error::DescriptionProvider(format!("request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!("Gemini API returned {}: {}", status, body);
            return Err(Error::DescriptionProvider(format!(
                "API error ({})",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .map_err(|err| Error::DescriptionProvider(format!("invalid response: {}", err)))?;
        let text = extract_text(&payload).ok_or_else(|| {
            Error::DescriptionProvider("No candidates in response".to_string())
        })?;

        parse_summary_reply(text)
    }
}

// ============================================
// Request Types
// ============================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

// ============================================
// Helper Functions
// ============================================

fn build_prompt(context: &EndpointContext) -> String {
    let parameters = if context.parameters.is_empty() {
        "none".to_string()
    } else {
        context.parameters.join(", ")
    };
    format!(
        "You are an expert technical writer for API documentation. \
         Generate a 'summary' and a 'description' for a REST API endpoint. \
         The 'summary' must be a single, concise sentence starting with a verb (e.g. 'Retrieves...', 'Creates...'). \
         The 'description' should be a brief paragraph of 1-3 sentences explaining what the endpoint does. \
         Respond ONLY with a valid JSON object in the format: {{\"summary\": \"...\", \"description\": \"...\"}}\n\n\
         --- Endpoint Details ---\n\
         Method Name: {}\n\
         HTTP Method: {}\n\
         Path: {}\n\
         Parameters: {}\n\
         Response Type: {}\n\
         --- End Details ---",
        context.method_name, context.verb, context.path, parameters, context.response_type
    )
}

fn extract_text(root: &Value) -> Option<&str> {
    root.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Parse the model's reply, tolerating a surrounding markdown code fence.
pub(crate) fn parse_summary_reply(text: &str) -> Result<EndpointSummary> {
    let mut body = text.trim();
    body = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```"))
        .unwrap_or(body);
    body = body.strip_suffix("```").unwrap_or(body).trim();

    if body.is_empty() {
        return Err(Error::DescriptionProvider("Response text was empty".to_string()));
    }

    let reply: Value = serde_json::from_str(body)
        .map_err(|err| Error::DescriptionProvider(format!("reply is not JSON: {}", err)))?;
    let field = |key: &str| {
        reply
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (field("summary"), field("description")) {
        (Some(summary), Some(description)) => Ok(EndpointSummary {
            summary,
            description,
        }),
        _ => Err(Error::DescriptionProvider(
            "Failed to extract summary or description".to_string(),
        )),
    }
}
