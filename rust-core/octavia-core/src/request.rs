//! # HTTP Request
//!
//! Transport-independent request data seen by middlewares and handlers.
//!
//! The query string is split off and decoded at construction. Header
//! names are case-insensitive (stored lower-cased by `HeaderMap`). Every
//! request carries an `x-request-id`, generated when the client did not
//! send one.

use crate::router::Method;
use crate::upload::UploadedFile;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

/// Header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the client address, set by the host
pub const CLIENT_IP_HEADER: &str = "x-client-ip";

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method, may be rewritten by BEFORE_ROUTING middlewares
    pub method: Method,
    /// Request path without query string
    pub path: String,
    query_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    decoded_body: Option<Value>,
    files: Vec<UploadedFile>,
}

impl Request {
    /// Create a request.
    ///
    /// A `?query` suffix on `path` is split off and URL-decoded into the
    /// query map. Invalid header names or values are skipped.
    #[must_use]
    pub fn new(
        method: Method,
        path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &headers_map {
            insert_header(&mut headers, name, value);
        }

        Self::from_parts(method, path, query_string.as_deref(), headers, body)
    }

    /// Assemble a request from already split parts
    pub(crate) fn from_parts(
        method: Method,
        path: String,
        query_string: Option<&str>,
        mut headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        if !headers.contains_key(REQUEST_ID_HEADER) {
            if let Ok(id) = HeaderValue::from_str(&generate_request_id()) {
                headers.insert(REQUEST_ID_HEADER, id);
            }
        }

        Self {
            method,
            path,
            query_params: decode_query(query_string),
            headers,
            body,
            decoded_body: None,
            files: Vec::new(),
        }
    }

    /// Attach uploaded files (builder)
    #[must_use]
    pub fn with_files(mut self, files: Vec<UploadedFile>) -> Self {
        self.files = files;
        self
    }

    /// Attach an already decoded body (builder)
    #[must_use]
    pub fn with_decoded_body(mut self, body: Value) -> Self {
        self.decoded_body = Some(body);
        self
    }

    /// Header value by case-insensitive name, if it is valid text
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace a header; invalid names or values are ignored
    pub fn set_header(&mut self, name: &str, value: &str) {
        insert_header(&mut self.headers, name, value);
    }

    /// Raw header map
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Text headers as owned pairs, for logging
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let Ok(text) = value.to_str() {
                map.insert(name.as_str().to_string(), text.to_string());
            }
        }
        map
    }

    /// Correlation id of this request
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.header(REQUEST_ID_HEADER).unwrap_or("-")
    }

    /// Key identifying the client, used for rate limiting
    #[must_use]
    pub fn client_key(&self) -> &str {
        self.header(CLIENT_IP_HEADER)
            .or_else(|| {
                self.header("x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
            })
            .unwrap_or("unknown")
    }

    /// Decoded query parameters
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Replace a query parameter
    pub fn set_query(&mut self, key: &str, value: &str) {
        self.query_params.insert(key.to_string(), value.to_string());
    }

    /// Raw body
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Raw body, when it is valid UTF-8
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(self.body.as_deref()?).ok()
    }

    /// Body decoded by a body-decoding middleware
    #[must_use]
    pub const fn decoded_body(&self) -> Option<&Value> {
        self.decoded_body.as_ref()
    }

    /// Replace the decoded body
    pub fn set_decoded_body(&mut self, body: Value) {
        self.decoded_body = Some(body);
    }

    /// Files received with the request
    #[must_use]
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }
}

fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

/// Decoded `key=value` pairs; a repeated key keeps its last value
fn decode_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(url_decode(key), url_decode(value));
    }
    params
}

/// Percent-decoding with `+` as space; invalid escapes are kept verbatim
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..=i + 2])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_query() {
        let params = decode_query(Some("page=1&limit=10&page=3&flag"));
        assert_eq!(params.len(), 3);
        assert_eq!(params["page"], "3");
        assert_eq!(params["limit"], "10");
        assert_eq!(params["flag"], "");

        assert!(decode_query(None).is_empty());
        assert!(decode_query(Some("&&")).is_empty());
    }

    #[test]
    fn test_decode_query_escapes() {
        let params = decode_query(Some("q=rust+lang&dest=S%C3%A3o%20Paulo"));
        assert_eq!(params["q"], "rust lang");
        assert_eq!(params["dest"], "São Paulo");
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
        assert_eq!(url_decode("caf%C3%A9"), "café");
        assert_eq!(url_decode("bad%zz"), "bad%zz");
        assert_eq!(url_decode("tail%2"), "tail%2");
    }

    #[test]
    fn test_request_splits_query() {
        let path = "/api/users?language=en".to_string();
        let req = Request::new(Method::Get, path, HashMap::new(), None);
        assert_eq!(req.path, "/api/users");
        assert_eq!(req.query_map().get("language"), Some(&"en".to_string()));
    }

    #[test]
    fn test_request_headers_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-Client-IP".to_string(), "10.0.0.1".to_string());
        let req = Request::new(Method::Get, "/".to_string(), headers, None);
        assert_eq!(req.header("x-client-ip"), Some("10.0.0.1"));
        assert_eq!(req.client_key(), "10.0.0.1");
    }

    #[test]
    fn test_request_id_generated_or_kept() {
        let generated = Request::new(Method::Get, "/".to_string(), HashMap::new(), None);
        assert_eq!(generated.request_id().len(), 32);

        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "abc".to_string());
        let kept = Request::new(Method::Get, "/".to_string(), headers, None);
        assert_eq!(kept.request_id(), "abc");
    }

    #[test]
    fn test_client_key_fallbacks() {
        let mut headers = HashMap::new();
        headers.insert("x-forwarded-for".to_string(), "1.2.3.4, 5.6.7.8".to_string());
        let req = Request::new(Method::Get, "/".to_string(), headers, None);
        assert_eq!(req.client_key(), "1.2.3.4");

        let anon = Request::new(Method::Get, "/".to_string(), HashMap::new(), None);
        assert_eq!(anon.client_key(), "unknown");
    }

    #[test]
    fn test_body_access() {
        let body = Some(Bytes::from("hi"));
        let req = Request::new(Method::Post, "/".to_string(), HashMap::new(), body);
        assert_eq!(req.body_str(), Some("hi"));
        assert!(req.decoded_body().is_none());
    }
}
