//! Outbound request descriptor

use crate::transport::{RequestBody, TransportRequest};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// One outbound call plus its retry state
///
/// Everything but `attempts_made` describes intent and is fixed once the
/// request is built. `attempts_made` is advanced only by dispatch and
/// restarts from zero each time the request is dispatched again, so it never
/// exceeds `max_retries`.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    form: Option<Vec<(String, String)>>,
    json: Option<Value>,
    headers: BTreeMap<String, String>,
    max_retries: u32,
    attempts_made: u32,
    extensions: Map<String, Value>,
}

impl RequestDescriptor {
    /// Create a request for `path`, relative to the backend's base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            form: None,
            json: None,
            headers: BTreeMap::new(),
            max_retries: 1,
            attempts_made: 0,
            extensions: Map::new(),
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query parameter, keeping insertion order
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a form-encoded body
    #[must_use]
    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn with_json(mut self, payload: Value) -> Self {
        self.json = Some(payload);
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the attempt budget (values below 1 are raised to 1)
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Attach a backend-specific field
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the backend's base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Ordered query parameters
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Form-encoded body, if any
    #[must_use]
    pub fn form(&self) -> Option<&[(String, String)]> {
        self.form.as_deref()
    }

    /// JSON body, if any
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Extra headers
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Attempt budget
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Attempts made by the latest dispatch
    #[must_use]
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Whether the attempt budget is spent
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_retries
    }

    /// Backend-specific fields
    #[must_use]
    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// Look up one backend-specific field
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts_made += 1;
    }

    pub(crate) fn reset_attempts(&mut self) {
        self.attempts_made = 0;
    }

    /// View this request as the transport sees it
    pub(crate) fn to_transport<'a>(
        &'a self,
        url: &'a str,
        request_id: &'a str,
    ) -> TransportRequest<'a> {
        let body = match (&self.form, &self.json) {
            (Some(fields), json) => {
                if json.is_some() {
                    debug!(path = %self.path, "Both form and JSON bodies set, sending form");
                }
                RequestBody::Form(fields)
            }
            (None, Some(payload)) => RequestBody::Json(payload),
            (None, None) => RequestBody::Empty,
        };

        TransportRequest {
            method: &self.method,
            url,
            query: &self.query,
            headers: &self.headers,
            body,
            request_id,
        }
    }
}
