//! Request and response envelopes.
//!
//! Requests arrive as API gateway proxy events: an optional string body and
//! a header map whose key case is not guaranteed.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// An incoming request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Request {
    /// Raw body.
    #[serde(default)]
    pub body: Option<String>,
    /// Request headers.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub headers: HashMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Request {
    /// Creates a request with a body.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            headers: HashMap::new(),
        }
    }

    /// Builder method to add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns a header value, matching the name case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// CORS settings applied to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Value of `Access-Control-Allow-Origin`.
    pub allow_origin: String,
}

impl CorsPolicy {
    /// Creates a policy allowing `origin`.
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self {
            allow_origin: allow_origin.into(),
        }
    }

    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
            (
                "Access-Control-Allow-Headers".to_string(),
                "Content-Type, Authorization".to_string(),
            ),
            (
                "Access-Control-Allow-Methods".to_string(),
                "GET, POST, OPTIONS".to_string(),
            ),
        ])
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body, or empty.
    pub body: String,
}

impl Response {
    /// A JSON response.
    pub fn json(status_code: u16, body: &Value, cors: &CorsPolicy) -> Self {
        let mut headers = cors.headers();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// A JSON error response: `{"error": message}`.
    pub fn error(status_code: u16, message: impl AsRef<str>, cors: &CorsPolicy) -> Self {
        Self::json(status_code, &json!({ "error": message.as_ref() }), cors)
    }

    /// An empty response.
    pub fn empty(status_code: u16, cors: &CorsPolicy) -> Self {
        Self {
            status_code,
            headers: cors.headers(),
            body: String::new(),
        }
    }

    /// Parses the body as JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}
