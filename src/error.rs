//! Gateway error types.
//!
//! Every failure the routing core can produce is a [`GatewayError`]. The
//! HTTP listener maps them to status codes through [`IntoResponse`]; other
//! transports can switch on [`GatewayError::kind`].

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::schema::{HttpVerb, ParamType};
use crate::config::validation::ValidationErrors;
use crate::mapping::rules::Scope;

/// Gateway-level errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for {verb} {path}")]
    RouteNotFound { verb: HttpVerb, path: String },

    #[error("{verb} is not allowed on {path}")]
    MethodNotAllowed {
        verb: HttpVerb,
        path: String,
        allowed: Vec<HttpVerb>,
    },

    #[error("header '{header}' must be '{expected}'")]
    PreconditionFailed { header: String, expected: String },

    #[error("missing required {scope} parameter '{name}'")]
    MissingParameter { scope: Scope, name: String },

    #[error("{scope} parameter '{name}' is not a valid {expected}: '{value}'")]
    TypeMismatch {
        scope: Scope,
        name: String,
        expected: ParamType,
        value: String,
    },

    #[error("request body rejected by definition '{definition}': {reason}")]
    BodyValidationFailed { definition: String, reason: String },

    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("value '{value}' cannot be used as backend path variable '{variable}'")]
    InvalidPathValue { variable: String, value: String },

    #[error("mapping source '{reference}' was not extracted from the request")]
    UnresolvedMappingSource { reference: String },

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{option}' failed: {reason}")]
    OptionFailed { option: String, reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(ValidationErrors),

    #[error("backend call timed out after {0:?}")]
    DispatchTimeout(Duration),

    #[error("backend call failed: {0}")]
    DispatchFailed(String),

    #[error("filter '{filter}' aborted the request: {reason}")]
    FilterAborted { filter: String, reason: String },
}

/// Fieldless discriminant of [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RouteNotFound,
    MethodNotAllowed,
    PreconditionFailed,
    MissingParameter,
    TypeMismatch,
    BodyValidationFailed,
    MalformedBody,
    InvalidPathValue,
    UnresolvedMappingSource,
    UnknownOption,
    OptionFailed,
    Configuration,
    DispatchTimeout,
    DispatchFailed,
    FilterAborted,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::RouteNotFound => "ROUTE_NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorKind::MissingParameter => "MISSING_PARAMETER",
            ErrorKind::TypeMismatch => "TYPE_MISMATCH",
            ErrorKind::BodyValidationFailed => "BODY_VALIDATION_FAILED",
            ErrorKind::MalformedBody => "MALFORMED_BODY",
            ErrorKind::InvalidPathValue => "INVALID_PATH_VALUE",
            ErrorKind::UnresolvedMappingSource => "UNRESOLVED_MAPPING_SOURCE",
            ErrorKind::UnknownOption => "UNKNOWN_OPTION",
            ErrorKind::OptionFailed => "OPTION_FAILED",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::DispatchTimeout => "DISPATCH_TIMEOUT",
            ErrorKind::DispatchFailed => "DISPATCH_FAILED",
            ErrorKind::FilterAborted => "FILTER_ABORTED",
        }
    }
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            GatewayError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            GatewayError::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            GatewayError::MissingParameter { .. } => ErrorKind::MissingParameter,
            GatewayError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            GatewayError::BodyValidationFailed { .. } => ErrorKind::BodyValidationFailed,
            GatewayError::MalformedBody(_) => ErrorKind::MalformedBody,
            GatewayError::InvalidPathValue { .. } => ErrorKind::InvalidPathValue,
            GatewayError::UnresolvedMappingSource { .. } => ErrorKind::UnresolvedMappingSource,
            GatewayError::UnknownOption(_) => ErrorKind::UnknownOption,
            GatewayError::OptionFailed { .. } => ErrorKind::OptionFailed,
            GatewayError::Configuration(_) => ErrorKind::Configuration,
            GatewayError::DispatchTimeout(_) => ErrorKind::DispatchTimeout,
            GatewayError::DispatchFailed(_) => ErrorKind::DispatchFailed,
            GatewayError::FilterAborted { .. } => ErrorKind::FilterAborted,
        }
    }

    /// Client-facing HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorKind::MissingParameter
            | ErrorKind::TypeMismatch
            | ErrorKind::OptionFailed
            | ErrorKind::MalformedBody
            | ErrorKind::InvalidPathValue => StatusCode::BAD_REQUEST,
            ErrorKind::BodyValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UnresolvedMappingSource
            | ErrorKind::UnknownOption
            | ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::DispatchTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::DispatchFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::FilterAborted => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.kind().code(),
                "message": self.to_string(),
            }
        }));

        let mut response = (status, body).into_response();
        if let GatewayError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed.iter().map(HttpVerb::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = allow.parse() {
                response.headers_mut().insert(axum::http::header::ALLOW, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_distinguishes_not_found_and_not_allowed() {
        let not_found = GatewayError::RouteNotFound {
            verb: HttpVerb::Get,
            path: "/ping".into(),
        };
        let not_allowed = GatewayError::MethodNotAllowed {
            verb: HttpVerb::Delete,
            path: "/ping".into(),
            allowed: vec![HttpVerb::Get, HttpVerb::Post],
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_allowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);

        let response = not_allowed.into_response();
        assert_eq!(response.headers()["allow"], "GET, POST");
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = GatewayError::DispatchTimeout(Duration::from_millis(250));
        assert_eq!(err.kind(), ErrorKind::DispatchTimeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
