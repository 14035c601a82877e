//! Mock short-circuit.
//!
//! A method with `mock: true` still runs the full resolver, so a mocked
//! route rejects exactly the requests the real one would. Instead of a
//! backend call, the client gets the call that would have been made.

use axum::http::StatusCode;
use serde_json::json;

use crate::integration::{GatewayResponse, ResponseOrigin};
use crate::mapping::IntegrationCall;

/// Canned 200 response describing `call`.
pub fn mock_response(call: &IntegrationCall) -> GatewayResponse {
    let body = serde_json::to_value(call).unwrap_or_else(|e| json!({ "error": e.to_string() }));
    let mut response = GatewayResponse::json(StatusCode::OK, &body);
    response.origin = ResponseOrigin::Mock;
    response
}
