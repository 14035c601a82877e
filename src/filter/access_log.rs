//! Access log filter.
//!
//! Emits one structured event when a request enters the chain and one when
//! its response leaves it, with status, origin and latency.

use async_trait::async_trait;

use crate::filter::{Filter, RequestContext};
use crate::integration::GatewayResponse;

/// `access_log`: request and response events via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLogFilter;

#[async_trait]
impl Filter for AccessLogFilter {
    async fn on_request(&self, ctx: &mut RequestContext) -> Result<(), String> {
        tracing::info!(
            request_id = %ctx.request_id,
            verb = %ctx.verb,
            path = %ctx.path,
            route = %ctx.route,
            protocol = %ctx.call.protocol,
            "→ inbound request"
        );
        Ok(())
    }

    async fn on_response(&self, ctx: &RequestContext, response: &mut GatewayResponse) -> Result<(), String> {
        let latency_ms = ctx.started.elapsed().as_millis() as u64;
        if response.status.is_server_error() {
            tracing::error!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                status = response.status.as_u16(),
                origin = response.origin.as_str(),
                latency_ms,
                "← backend error response"
            );
        } else {
            tracing::info!(
                request_id = %ctx.request_id,
                path = %ctx.path,
                status = response.status.as_u16(),
                origin = response.origin.as_str(),
                latency_ms,
                "← outbound response"
            );
        }
        Ok(())
    }
}
