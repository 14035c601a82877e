//! Filter subsystem.
//!
//! Filters are named capabilities attached to resources and methods in the
//! API config. The effective chain of a method is its resource filters
//! ancestor-to-leaf followed by its own.
//!
//! ```text
//! Request  ──► /api filters ──► /api/users filters ──► method filters ──► backend
//! Response ◄── /api filters ◄── /api/users filters ◄── method filters ◄──┘
//! ```
//!
//! # Design Decisions
//! - Filters are resolved by name when a generation is built; an unknown
//!   name fails the build rather than the request
//! - A filter error aborts the request (403) and names the filter

mod access_log;

pub use access_log::AccessLogFilter;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::schema::HttpVerb;
use crate::config::validation::ValidationErrors;
use crate::error::GatewayError;
use crate::http::request::RawRequest;
use crate::integration::GatewayResponse;
use crate::mapping::IntegrationCall;

/// Per-request state visible to filters.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub verb: HttpVerb,
    pub path: String,
    /// Effective path template of the matched route.
    pub route: String,
    pub path_params: Vec<(String, String)>,
    /// The resolved call; pre filters may still change it.
    pub call: IntegrationCall,
    pub started: Instant,
    attributes: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(request: &RawRequest, route: &str, path_params: Vec<(String, String)>, call: IntegrationCall) -> Self {
        Self {
            request_id: request
                .request_id()
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            verb: request.verb.clone(),
            path: request.path.clone(),
            route: route.to_string(),
            path_params,
            call,
            started: Instant::now(),
            attributes: HashMap::new(),
        }
    }

    /// Scratch value shared between a filter's request and response hooks.
    pub fn set_attr(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A request/response hook. Both hooks default to doing nothing.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Runs before dispatch; an error aborts the request.
    async fn on_request(&self, _ctx: &mut RequestContext) -> Result<(), String> {
        Ok(())
    }

    /// Runs after dispatch (or mock), in reverse chain order.
    async fn on_response(&self, _ctx: &RequestContext, _response: &mut GatewayResponse) -> Result<(), String> {
        Ok(())
    }
}

/// Name → filter table.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the filters this crate ships (`access_log`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("access_log", AccessLogFilter);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Filter + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Bind `names` to filters; every unknown name is reported.
    pub fn chain(&self, names: &[String], location: &str, errors: &mut ValidationErrors) -> FilterChain {
        let mut filters = Vec::with_capacity(names.len());
        for name in names {
            match self.filters.get(name) {
                Some(filter) => filters.push((name.clone(), Arc::clone(filter))),
                None => errors.push(location, format!("unknown filter '{}'", name)),
            }
        }
        FilterChain { filters }
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Filters of one method, in execution order.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<(String, Arc<dyn Filter>)>,
}

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(name, _)| name.as_str())
    }

    pub async fn run_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        for (name, filter) in &self.filters {
            if let Err(reason) = filter.on_request(ctx).await {
                tracing::warn!(request_id = %ctx.request_id, filter = %name, reason = %reason, "Filter aborted request");
                return Err(GatewayError::FilterAborted {
                    filter: name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    pub async fn run_response(&self, ctx: &RequestContext, response: &mut GatewayResponse) -> Result<(), GatewayError> {
        for (name, filter) in self.filters.iter().rev() {
            if let Err(reason) = filter.on_response(ctx, response).await {
                tracing::warn!(request_id = %ctx.request_id, filter = %name, reason = %reason, "Filter aborted response");
                return Err(GatewayError::FilterAborted {
                    filter: name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
