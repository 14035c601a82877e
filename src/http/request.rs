//! Transport-neutral inbound request.
//!
//! # Responsibilities
//! - Carry verb, path, headers, query and body into the gateway core
//! - Parse the query string once, preserving order
//! - Carry the request ID assigned at the edge
//!
//! # Design Decisions
//! - Body is fully buffered (`Bytes`); the listener enforces the size limit
//! - Repeated query keys are kept; lookups use the first occurrence

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::HttpVerb;

/// Request ID header, set by the listener and echoed in responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A buffered inbound request.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub verb: HttpVerb,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawRequest {
    pub fn new(verb: HttpVerb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build from already separated request parts.
    pub fn from_parts(verb: HttpVerb, path: &str, raw_query: Option<&str>, headers: HeaderMap, body: Bytes) -> Self {
        let query = raw_query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            verb,
            path: path.to_string(),
            headers,
            query,
            body,
        }
    }

    /// Add a header; invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn query_param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        let this = self.header("content-type", "application/json");
        this.body(value.to_string())
    }

    /// First value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_decodes_query() {
        let request = RawRequest::from_parts(
            HttpVerb::Get,
            "/search",
            Some("q=rust%20lang&page=2&q=second"),
            HeaderMap::new(),
            Bytes::new(),
        );
        assert_eq!(request.query_value("q"), Some("rust lang"));
        assert_eq!(request.query_value("page"), Some("2"));
        assert_eq!(request.query.len(), 3);
    }

    #[test]
    fn test_builder_headers_are_case_insensitive() {
        let request = RawRequest::new(HttpVerb::Post, "/x").header("X-Request-Id", "abc");
        assert_eq!(request.request_id(), Some("abc"));
    }
}
