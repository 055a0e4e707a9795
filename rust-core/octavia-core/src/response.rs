//! # HTTP Response
//!
//! Handler output. `data` stays a JSON value until an output middleware
//! encodes it; [`Response::body_text`] renders whatever is left for the
//! host.

use serde_json::Value;
use std::collections::HashMap;

/// HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Payload, encoded by BEFORE_OUTPUT middlewares
    pub data: Value,
    /// HTTP status code
    pub status: u16,
    headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            data: Value::Null,
            status: 200,
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// Create a 200 response carrying `data`
    #[must_use]
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Create a 302 redirect
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::default().with_status(302).with_header("Location", location)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header (builder)
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header; names are case-insensitive
    pub fn set_header(&mut self, key: &str, value: &str) {
        self.headers.insert(key.to_ascii_lowercase(), value.to_string());
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// All headers, names lower-cased
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Body as sent on the wire.
    ///
    /// String data is sent verbatim, `null` as an empty body, anything
    /// else as compact JSON.
    #[must_use]
    pub fn body_text(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
