//! Gateway core.
//!
//! # Data Flow
//! ```text
//! RawRequest
//!     → capture the active Generation (one Arc clone)
//!     → RouteIndex::find (verb + path)
//!     → under the effective deadline:
//!         → ParameterResolver::resolve → IntegrationCall
//!         → pre filters (ancestor-to-leaf, then method)
//!         → mock response or protocol dispatcher
//!         → post filters (reverse order)
//!     → GatewayResponse or GatewayError
//!
//! On reload:
//!     APIConfig → Generation::build (all or nothing)
//!     → single atomic store; in-flight requests keep their generation
//! ```
//!
//! # Design Decisions
//! - The active generation sits behind `ArcSwap`; readers never block
//! - A failed reload leaves the active generation untouched
//! - The core never retries; dispatchers own retry policy

mod generation;

pub use generation::{Components, Generation};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::config::schema::APIConfig;
use crate::error::GatewayError;
use crate::filter::RequestContext;
use crate::http::request::RawRequest;
use crate::integration::{mock_response, GatewayResponse};
use crate::observability::metrics;
use crate::resilience::timeouts::{effective_timeout, with_deadline};
use crate::routing::{MatchedMethod, RouteSummary};

/// Hot-reloadable request pipeline.
pub struct Gateway {
    active: ArcSwap<Generation>,
    next_id: AtomicU64,
    components: Components,
}

impl Gateway {
    /// Build the first generation from `config`.
    pub fn new(config: APIConfig, components: Components) -> Result<Self, GatewayError> {
        let generation = Generation::build(1, config, &components)?;
        metrics::record_generation(generation.id());
        tracing::info!(
            generation = generation.id(),
            routes = generation.index().routes().len(),
            "Gateway initialized"
        );
        Ok(Self {
            active: ArcSwap::from_pointee(generation),
            next_id: AtomicU64::new(2),
            components,
        })
    }

    /// Build a new generation and activate it atomically.
    ///
    /// Returns the new generation id. On error nothing changes.
    pub fn reload(&self, config: APIConfig) -> Result<u64, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let generation = match Generation::build(id, config, &self.components) {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(
                    generation = id,
                    active = self.active.load().id(),
                    error = %e,
                    "Reload rejected; keeping active generation"
                );
                return Err(e);
            }
        };

        let routes = generation.index().routes().len();
        let previous = self.active.swap(Arc::new(generation));
        metrics::record_generation(id);
        tracing::info!(generation = id, previous = previous.id(), routes, "Generation activated");
        Ok(id)
    }

    /// The active generation. Holding it pins that generation in memory.
    pub fn generation(&self) -> Arc<Generation> {
        self.active.load_full()
    }

    /// Every declared method of the active generation.
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.active.load().index().summaries()
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Serve one request against the active generation.
    pub async fn handle(&self, request: RawRequest) -> Result<GatewayResponse, GatewayError> {
        let generation = self.generation();
        self.handle_in(&generation, request).await
    }

    /// Serve one request against a specific generation.
    pub async fn handle_in(&self, generation: &Generation, request: RawRequest) -> Result<GatewayResponse, GatewayError> {
        let started = Instant::now();

        let (route, result) = match generation.index().find(&request.verb, &request.path) {
            Ok(matched) => {
                let deadline = effective_timeout(matched.method.timeout, self.components.default_timeout);
                let route = matched.route.path.clone();
                let result = with_deadline(deadline, self.run(generation, &matched, &request)).await;
                if let Err(GatewayError::DispatchTimeout(_)) = &result {
                    tracing::warn!(route = %route, deadline = ?deadline, "Request deadline exceeded");
                }
                (route, result)
            }
            Err(e) => (String::from("none"), Err(e)),
        };

        let status = match &result {
            Ok(response) => response.status.as_u16(),
            Err(e) => e.status_code().as_u16(),
        };
        metrics::record_request(request.verb.as_str(), status, &route, started);
        tracing::debug!(
            generation = generation.id(),
            verb = %request.verb,
            path = %request.path,
            route = %route,
            status,
            "Request handled"
        );
        result
    }

    async fn run(&self, generation: &Generation, matched: &MatchedMethod<'_>, request: &RawRequest) -> Result<GatewayResponse, GatewayError> {
        let call = generation.resolver().resolve(matched, request)?;
        let mut ctx = RequestContext::new(request, &matched.route.path, matched.path_params.clone(), call);

        let chain = generation.chain(matched);
        if let Some(chain) = chain {
            chain.run_request(&mut ctx).await?;
        }

        let mut response = if matched.method.mock {
            mock_response(&ctx.call)
        } else {
            self.components.dispatchers.dispatch(&ctx.call).await?
        };

        if let Some(chain) = chain {
            chain.run_response(&ctx, &mut response).await?;
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("active", &self.active.load().id())
            .field("components", &self.components)
            .finish()
    }
}
