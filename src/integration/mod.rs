//! Backend integration subsystem.
//!
//! # Data Flow
//! ```text
//! IntegrationCall
//!     → mock.rs (method.mock: canned response, no backend)
//!     → DispatcherRegistry (by protocol)
//!         → http.rs  (hyper client, idempotent retries)
//!         → retry.rs (wraps any dispatcher; retries from backend config)
//!     → GatewayResponse
//! ```
//!
//! # Design Decisions
//! - One dispatcher per protocol; protocols without one fail with 502
//! - Dispatchers are shared trait objects, safe to call concurrently
//! - Responses are fully buffered so post filters can inspect them

pub mod http;
pub mod mock;
pub mod retry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::schema::RequestType;
use crate::error::GatewayError;
use crate::mapping::IntegrationCall;

pub use self::http::HttpDispatcher;
pub use self::mock::mock_response;
pub use self::retry::RetryingDispatcher;

/// Response header naming where a response came from.
pub const X_GATEWAY_ORIGIN: &str = "x-gateway-origin";

/// Who produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
    Backend,
    Mock,
}

impl ResponseOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseOrigin::Backend => "backend",
            ResponseOrigin::Mock => "mock",
        }
    }
}

/// Buffered response on its way back to the client.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub origin: ResponseOrigin,
}

impl GatewayResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            origin: ResponseOrigin::Backend,
        }
    }

    /// JSON response with the content type set.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Body as JSON, when it is JSON.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response.headers_mut().insert(
            X_GATEWAY_ORIGIN,
            HeaderValue::from_static(self.origin.as_str()),
        );
        response
    }
}

/// Sends a resolved call to its backend.
#[async_trait]
pub trait IntegrationDispatcher: Send + Sync {
    async fn dispatch(&self, call: &IntegrationCall) -> Result<GatewayResponse, GatewayError>;
}

#[async_trait]
impl<D> IntegrationDispatcher for Arc<D>
where
    D: IntegrationDispatcher + ?Sized,
{
    async fn dispatch(&self, call: &IntegrationCall) -> Result<GatewayResponse, GatewayError> {
        (**self).dispatch(call).await
    }
}

/// Protocol → dispatcher table.
#[derive(Clone, Default)]
pub struct DispatcherRegistry {
    dispatchers: HashMap<RequestType, Arc<dyn IntegrationDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the dispatcher for `protocol`.
    pub fn register<D>(&mut self, protocol: RequestType, dispatcher: D)
    where
        D: IntegrationDispatcher + 'static,
    {
        self.dispatchers.insert(protocol, Arc::new(dispatcher));
    }

    pub fn get(&self, protocol: &RequestType) -> Option<&Arc<dyn IntegrationDispatcher>> {
        self.dispatchers.get(protocol)
    }

    /// Route `call` to the dispatcher of its protocol.
    pub async fn dispatch(&self, call: &IntegrationCall) -> Result<GatewayResponse, GatewayError> {
        let dispatcher = self.get(&call.protocol).ok_or_else(|| {
            GatewayError::DispatchFailed(format!("no dispatcher for protocol '{}'", call.protocol))
        })?;
        dispatcher.dispatch(call).await
    }
}

impl fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("protocols", &self.dispatchers.keys().collect::<Vec<_>>())
            .finish()
    }
}
