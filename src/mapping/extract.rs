//! Inbound parameter extraction.
//!
//! Checks static header requirements, pulls declared header and query
//! parameters out of the request and coerces them to their declared types.
//! The result is an [`InboundValues`] table the mapping rules read from.

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde_json::Value;

use crate::config::schema::{ParamType, Params};
use crate::error::GatewayError;
use crate::mapping::rules::{Scope, SourceRef};
use crate::routing::MatchedMethod;
use crate::http::request::RawRequest;

/// Outcome of looking up a mapping source.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    /// Declared but not sent.
    Absent,
    /// Never declared or extracted; reading it is a configuration mistake.
    Undeclared,
}

/// Typed inbound values of one request.
#[derive(Debug, Default)]
pub struct InboundValues {
    /// Declared headers by lower-cased name; `None` when not sent.
    headers: HashMap<String, Option<Value>>,
    /// Declared query parameters; `None` when not sent.
    query: HashMap<String, Option<Value>>,
    path: HashMap<String, Value>,
    body: Option<Value>,
}

impl InboundValues {
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn get(&self, source: &SourceRef) -> Lookup<'_> {
        let declared = match source.scope {
            Scope::Header => self.headers.get(&source.name().to_ascii_lowercase()),
            Scope::Query => self.query.get(source.name()),
            Scope::Path => {
                return match self.path.get(source.name()) {
                    Some(value) => Lookup::Found(value),
                    None => Lookup::Undeclared,
                };
            }
            Scope::Body => {
                let Some(mut value) = self.body.as_ref() else {
                    return Lookup::Undeclared;
                };
                for key in &source.field {
                    match value.get(key) {
                        Some(inner) => value = inner,
                        None => return Lookup::Absent,
                    }
                }
                return Lookup::Found(value);
            }
        };
        match declared {
            Some(Some(value)) => Lookup::Found(value),
            Some(None) => Lookup::Absent,
            None => Lookup::Undeclared,
        }
    }
}

/// Every static header of the route chain must be present with the exact value.
pub fn check_preconditions(required: &[(String, String)], headers: &HeaderMap) -> Result<(), GatewayError> {
    for (name, expected) in required {
        let actual = headers.get(name.as_str()).and_then(|v| v.to_str().ok());
        if actual != Some(expected.as_str()) {
            return Err(GatewayError::PreconditionFailed {
                header: name.clone(),
                expected: expected.clone(),
            });
        }
    }
    Ok(())
}

/// Extract declared header, query and path parameters.
pub fn extract_params(matched: &MatchedMethod<'_>, request: &RawRequest) -> Result<InboundValues, GatewayError> {
    let inbound = &matched.method.inbound;
    let mut values = InboundValues::default();

    for param in &inbound.headers {
        let raw = match request.headers.get(param.name.as_str()) {
            Some(value) => Some(value.to_str().map_err(|_| GatewayError::TypeMismatch {
                scope: Scope::Header,
                name: param.name.clone(),
                expected: param.kind.clone(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })?),
            None => None,
        };
        let value = read_param(Scope::Header, param, raw)?;
        values.headers.insert(param.name.to_ascii_lowercase(), value);
    }

    for param in &inbound.query_strings {
        let value = read_param(Scope::Query, param, request.query_value(&param.name))?;
        values.query.insert(param.name.clone(), value);
    }

    values.path = matched
        .path_params
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();

    Ok(values)
}

fn read_param(scope: Scope, param: &Params, raw: Option<&str>) -> Result<Option<Value>, GatewayError> {
    match raw {
        Some(raw) => coerce(scope, param, raw).map(Some),
        None if param.required => Err(GatewayError::MissingParameter {
            scope,
            name: param.name.clone(),
        }),
        None => Ok(None),
    }
}

/// Convert a raw string to the parameter's declared type.
pub fn coerce(scope: Scope, param: &Params, raw: &str) -> Result<Value, GatewayError> {
    let mismatch = || GatewayError::TypeMismatch {
        scope,
        name: param.name.clone(),
        expected: param.kind.clone(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    match &param.kind {
        ParamType::String | ParamType::Unknown(_) => Ok(Value::String(raw.to_string())),
        ParamType::Int => trimmed.parse::<i64>().map(Value::from).map_err(|_| mismatch()),
        ParamType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),
        ParamType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
    }
}
