//! HTTP backend dispatcher.
//!
//! # Responsibilities
//! - Turn an [`HttpCall`] into a hyper request
//! - Retry idempotent calls on connection errors and 502/503/504
//! - Buffer the backend response for post filters
//!
//! # Design Decisions
//! - One pooled hyper-util client shared by all calls
//! - Hop-by-hop headers of the backend response are dropped
//! - Non-idempotent verbs are attempted exactly once

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::settings::RetryConfig;
use crate::error::GatewayError;
use crate::integration::{GatewayResponse, IntegrationDispatcher, ResponseOrigin};
use crate::mapping::{HttpCall, IntegrationCall};
use crate::observability::metrics;
use crate::resilience::retries::{is_retryable, RetryPolicy};

const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Dispatcher for `requestType: http` backends.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: Client<HttpConnector, Body>,
    policy: RetryPolicy,
    max_response_bytes: usize,
}

impl HttpDispatcher {
    pub fn new(policy: RetryPolicy) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            policy,
            max_response_bytes: 16 * 1024 * 1024, // 16MB
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(RetryPolicy::from_config(config))
    }

    /// Largest backend body that will be buffered.
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    fn build_request(call: &HttpCall) -> Result<Request<Body>, GatewayError> {
        let method = Method::from_bytes(call.verb.as_str().as_bytes())
            .map_err(|e| GatewayError::DispatchFailed(format!("invalid verb '{}': {}", call.verb, e)))?;

        let mut builder = Request::builder().method(method).uri(call.uri());
        let headers = builder
            .headers_mut()
            .ok_or_else(|| GatewayError::DispatchFailed(format!("invalid backend uri '{}'", call.uri())))?;
        for (name, value) in &call.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GatewayError::DispatchFailed(format!("header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GatewayError::DispatchFailed(format!("header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let body = match &call.body {
            Some(json) => {
                if !headers.contains_key(header::CONTENT_TYPE) {
                    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Bytes::from(json.to_string())
            }
            None => call.raw_body.clone(),
        };

        builder
            .body(Body::from(body))
            .map_err(|e| GatewayError::DispatchFailed(format!("invalid backend request: {}", e)))
    }
}

#[async_trait]
impl IntegrationDispatcher for HttpDispatcher {
    async fn dispatch(&self, call: &IntegrationCall) -> Result<GatewayResponse, GatewayError> {
        let http = call
            .as_http()
            .ok_or_else(|| GatewayError::DispatchFailed(format!("{} call sent to http dispatcher", call.protocol)))?;
        let uri = http.uri();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = Self::build_request(http)?;

            match self.client.request(request).await {
                Ok(response) => {
                    let status = response.status();
                    if self.policy.allows(attempt) && is_retryable(&http.verb, Some(status), false) {
                        let delay = self.policy.delay(attempt);
                        tracing::info!(uri = %uri, attempt, delay = ?delay, status = %status, "Retrying backend call");
                        metrics::record_retry("http");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let (parts, body) = response.into_parts();
                    let body = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
                        .await
                        .map_err(|e| GatewayError::DispatchFailed(format!("reading backend body: {}", e)))?;
                    let mut headers = parts.headers;
                    for name in HOP_BY_HOP {
                        headers.remove(name);
                    }

                    tracing::debug!(uri = %uri, status = %status, attempt, "Backend call completed");
                    return Ok(GatewayResponse {
                        status,
                        headers,
                        body,
                        origin: ResponseOrigin::Backend,
                    });
                }
                Err(e) => {
                    tracing::warn!(uri = %uri, attempt, error = %e, "Backend call failed");
                    if self.policy.allows(attempt) && is_retryable(&http.verb, None, true) {
                        let delay = self.policy.delay(attempt);
                        tracing::info!(uri = %uri, attempt, delay = ?delay, "Retrying after connection error");
                        metrics::record_retry("http");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(GatewayError::DispatchFailed(format!("{}: {}", uri, e)));
                }
            }
        }
    }
}
