//! Parameter resolver.
//!
//! # Responsibilities
//! - Enforce static header requirements of the route chain
//! - Extract, type-check and validate inbound parameters and body
//! - Apply mapping rules to build an [`IntegrationCall`]
//!
//! # Data Flow
//! ```text
//! MatchedMethod + RawRequest
//!     → preconditions (static headers)
//!     → declared header / query params (required, coerced)
//!     → body parsed and validated against each referenced definition
//!     → mapping rules in declaration order (Opt gating, option transform)
//!     → IntegrationCall
//! ```
//!
//! # Design Decisions
//! - Fails on the first problem; no partial call ever escapes
//! - A source is resolved before its Opt is consulted, so a rule reading an
//!   undeclared field is reported even when it would be skipped
//! - Last writer wins when several rules share a destination

use std::sync::Arc;

use serde_json::Value;

use crate::error::GatewayError;
use crate::http::request::RawRequest;
use crate::mapping::call::{value_to_string, CallTarget, IntegrationCall};
use crate::mapping::extract::{check_preconditions, extract_params, Lookup};
use crate::mapping::options::OptionRegistry;
use crate::mapping::rules::{MappingTarget, OptMode, Scope};
use crate::mapping::validator::SchemaValidator;
use crate::routing::path::{self, RenderError};
use crate::routing::MatchedMethod;

/// Turns a matched request into a backend call.
#[derive(Clone)]
pub struct ParameterResolver {
    options: Arc<OptionRegistry>,
    validator: Arc<dyn SchemaValidator>,
}

impl ParameterResolver {
    pub fn new(options: Arc<OptionRegistry>, validator: Arc<dyn SchemaValidator>) -> Self {
        Self { options, validator }
    }

    pub fn resolve(&self, matched: &MatchedMethod<'_>, request: &RawRequest) -> Result<IntegrationCall, GatewayError> {
        check_preconditions(&matched.route.headers, &request.headers)?;

        let values = extract_params(matched, request)?;
        let values = values.with_body(self.read_body(matched, request)?);

        let integration = &matched.method.integration;
        let mut call = IntegrationCall::from_backend(&integration.backend, &matched.verb);
        let mut path_values: Vec<(String, Value)> = Vec::new();

        for rule in &integration.rules {
            let value = match values.get(&rule.source) {
                Lookup::Found(value) => value.clone(),
                Lookup::Absent => continue,
                Lookup::Undeclared => {
                    return Err(GatewayError::UnresolvedMappingSource {
                        reference: rule.declared.name.clone(),
                    })
                }
            };

            let value = match &rule.opt {
                OptMode::Inert => value,
                OptMode::Skip => continue,
                OptMode::Transform(name) => self.options.transform(name, value)?,
            };

            match &rule.target {
                MappingTarget::PathVariable(name) => {
                    path_values.retain(|(existing, _)| existing != name);
                    path_values.push((name.clone(), value));
                }
                target => call.assign(target, value),
            }
        }

        if let CallTarget::Http(http) = &mut call.target {
            http.path = match &integration.path_template {
                Some(template) => path::render(template, |name| {
                    path_values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value_to_string(value))
                        .or_else(|| matched.path_param(name).map(str::to_string))
                })
                .map_err(|e| match e {
                    RenderError::Missing(name) => GatewayError::UnresolvedMappingSource {
                        reference: format!("path.{}", name),
                    },
                    RenderError::DotSegment { name, value } => GatewayError::InvalidPathValue {
                        variable: name.to_string(),
                        value,
                    },
                })?,
                None => request.path.clone(),
            };
            if http.body.is_none() {
                http.raw_body = request.body.clone();
            }
        }

        tracing::debug!(
            route = %matched.route.path,
            verb = %matched.verb,
            protocol = %call.protocol,
            rules = integration.rules.len(),
            "Integration call resolved"
        );
        Ok(call)
    }

    /// Parse the body; validate it when the method references definitions.
    ///
    /// Without definitions a non-JSON body is only an error when some rule
    /// reads from it; otherwise it is forwarded untouched.
    fn read_body(&self, matched: &MatchedMethod<'_>, request: &RawRequest) -> Result<Option<Value>, GatewayError> {
        let definitions = &matched.method.inbound.request_body;
        if definitions.is_empty() {
            if request.body.is_empty() {
                return Ok(None);
            }
            return match serde_json::from_slice(&request.body) {
                Ok(body) => Ok(Some(body)),
                Err(e) if reads_body(matched) => {
                    tracing::debug!(route = %matched.route.path, error = %e, "Request body is not JSON");
                    Err(GatewayError::MalformedBody(e.to_string()))
                }
                Err(_) => Ok(None),
            };
        }

        let body: Value = serde_json::from_slice(&request.body).map_err(|e| {
            GatewayError::BodyValidationFailed {
                definition: definitions[0].definition_name.clone(),
                reason: format!("body is not valid JSON: {}", e),
            }
        })?;
        for definition in definitions {
            self.validator
                .validate(&definition.definition_name, &body)
                .map_err(|reason| GatewayError::BodyValidationFailed {
                    definition: definition.definition_name.clone(),
                    reason,
                })?;
        }
        Ok(Some(body))
    }
}

fn reads_body(matched: &MatchedMethod<'_>) -> bool {
    matched
        .method
        .integration
        .rules
        .iter()
        .any(|rule| rule.source.scope == Scope::Body)
}

impl std::fmt::Debug for ParameterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{
        APIConfig, BodyDefinition, Definition, HttpBackendConfig, HttpVerb, InboundRequest,
        IntegrationRequest, MappingParam, Method, Opt, ParamType, Params, Resource, Backend,
        DubboBackendConfig,
    };
    use crate::error::ErrorKind;
    use crate::mapping::validator::JsonSchemaValidator;
    use crate::routing::RouteIndex;
    use serde_json::json;

    fn rule(name: &str, map_to: &str) -> MappingParam {
        MappingParam {
            name: name.into(),
            map_to: map_to.into(),
            opt: Opt::default(),
        }
    }

    fn with_opt(mut mapping: MappingParam, open: bool, usable: bool, name: &str) -> MappingParam {
        mapping.opt = Opt {
            name: name.into(),
            open,
            usable,
        };
        mapping
    }

    fn query(name: &str, kind: ParamType, required: bool) -> Params {
        Params {
            name: name.into(),
            kind,
            required,
        }
    }

    fn compile(path: &str, method: Method, definitions: Vec<Definition>) -> (RouteIndex, ParameterResolver) {
        let index = RouteIndex::compile(APIConfig {
            resources: vec![Resource {
                path: path.into(),
                methods: vec![method],
                ..Default::default()
            }],
            definitions,
            ..Default::default()
        })
        .unwrap();
        let validator = JsonSchemaValidator::compile(&index).unwrap();
        let resolver = ParameterResolver::new(
            Arc::new(OptionRegistry::with_builtins()),
            Arc::new(validator),
        );
        (index, resolver)
    }

    fn http_method(inbound: InboundRequest, backend_path: &str, mapping_params: Vec<MappingParam>) -> Method {
        Method {
            on_air: true,
            timeout: None,
            mock: false,
            filters: Vec::new(),
            http_verb: HttpVerb::Post,
            inbound_request: inbound,
            integration_request: IntegrationRequest {
                backend: Backend::Http(HttpBackendConfig {
                    host: "users:8080".into(),
                    path: backend_path.into(),
                    ..Default::default()
                }),
                mapping_params,
            },
        }
    }

    #[test]
    fn test_http_call_shape() {
        let inbound = InboundRequest {
            headers: vec![query("X-Token", ParamType::String, true)],
            query_strings: vec![query("limit", ParamType::Int, false)],
            ..Default::default()
        };
        let method = http_method(
            inbound,
            "/v2/users/:uid",
            vec![
                rule("path.id", "path.uid"),
                rule("header.x-token", "header.Authorization"),
                rule("query.limit", "query.max"),
                rule("query.limit", "body.page.size"),
            ],
        );
        let (index, resolver) = compile("/users/:id", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users/7").unwrap();
        let request = RawRequest::new(HttpVerb::Post, "/users/7")
            .header("x-token", "secret")
            .query_param("limit", "20");

        let call = resolver.resolve(&matched, &request).unwrap();
        let http = call.as_http().unwrap();
        assert_eq!(http.uri(), "http://users:8080/v2/users/7?max=20");
        assert_eq!(http.headers["Authorization"], "secret");
        assert_eq!(http.body, Some(json!({"page": {"size": 20}})));
        assert_eq!(http.verb, HttpVerb::Post);
    }

    #[test]
    fn test_missing_required_never_yields_call() {
        let inbound = InboundRequest {
            query_strings: vec![query("id", ParamType::Int, true)],
            ..Default::default()
        };
        let method = http_method(inbound, "", vec![rule("query.id", "query.id")]);
        let (index, resolver) = compile("/users", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();

        let err = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Post, "/users"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameter);

        let err = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Post, "/users").query_param("id", "x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_optional_absent_param_leaves_default() {
        let inbound = InboundRequest {
            query_strings: vec![query("page", ParamType::Int, false)],
            ..Default::default()
        };
        let method = http_method(inbound, "", vec![rule("query.page", "query.page")]);
        let (index, resolver) = compile("/users", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();
        let call = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Post, "/users"))
            .unwrap();
        let http = call.as_http().unwrap();
        assert!(http.query.is_empty());
        assert_eq!(http.path, "/users");
    }

    #[test]
    fn test_undeclared_source_is_unresolved() {
        let method = http_method(InboundRequest::default(), "", vec![rule("query.page", "query.page")]);
        let (index, resolver) = compile("/users", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();
        let err = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Post, "/users").query_param("page", "1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedMappingSource);
    }

    #[test]
    fn test_opt_truth_table_on_dubbo_arguments() {
        let method = Method {
            on_air: true,
            timeout: None,
            mock: false,
            filters: Vec::new(),
            http_verb: HttpVerb::Get,
            inbound_request: InboundRequest::default(),
            integration_request: IntegrationRequest {
                backend: Backend::Dubbo(DubboBackendConfig {
                    interface: "com.example.UserService".into(),
                    method: "find".into(),
                    param_types: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    ..Default::default()
                }),
                mapping_params: vec![
                    with_opt(rule("path.id", "0"), false, false, ""),
                    with_opt(rule("path.id", "1"), false, true, "uppercase"),
                    with_opt(rule("path.id", "2"), true, false, "uppercase"),
                    with_opt(rule("path.id", "3"), true, true, "uppercase"),
                ],
            },
        };
        let (index, resolver) = compile("/users/:id", method, vec![]);
        let matched = index.find(&HttpVerb::Get, "/users/ab").unwrap();
        let call = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Get, "/users/ab"))
            .unwrap();
        assert_eq!(
            call.as_dubbo().unwrap().args,
            vec![json!("ab"), json!("ab"), Value::Null, json!("AB")]
        );
    }

    #[test]
    fn test_last_writer_wins() {
        let inbound = InboundRequest {
            query_strings: vec![
                query("a", ParamType::String, true),
                query("b", ParamType::String, true),
                query("c", ParamType::String, true),
            ],
            ..Default::default()
        };
        let method = http_method(
            inbound,
            "",
            vec![
                rule("query.a", "header.X-Target"),
                rule("query.b", "header.X-Target"),
                rule("query.c", "header.X-Target"),
            ],
        );
        let (index, resolver) = compile("/t", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/t").unwrap();
        let request = RawRequest::new(HttpVerb::Post, "/t")
            .query_param("a", "1")
            .query_param("b", "2")
            .query_param("c", "3");
        let call = resolver.resolve(&matched, &request).unwrap();
        assert_eq!(call.as_http().unwrap().headers["X-Target"], "3");
    }

    #[test]
    fn test_body_is_validated_against_every_definition() {
        let mut inbound = InboundRequest::default();
        inbound.request_body = vec![
            BodyDefinition {
                definition_name: "Named".into(),
            },
            BodyDefinition {
                definition_name: "Aged".into(),
            },
        ];
        let method = http_method(inbound, "", vec![rule("body.name", "body.user")]);
        let definitions = vec![
            Definition {
                name: "Named".into(),
                schema: r#"{"type":"object","required":["name"]}"#.into(),
            },
            Definition {
                name: "Aged".into(),
                schema: r#"{"type":"object","required":["age"]}"#.into(),
            },
        ];
        let (index, resolver) = compile("/users", method, definitions);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();

        let ok = RawRequest::new(HttpVerb::Post, "/users").json(&json!({"name": "ann", "age": 3}));
        let call = resolver.resolve(&matched, &ok).unwrap();
        assert_eq!(call.as_http().unwrap().body, Some(json!({"user": "ann"})));

        let partial = RawRequest::new(HttpVerb::Post, "/users").json(&json!({"name": "ann"}));
        match resolver.resolve(&matched, &partial).unwrap_err() {
            GatewayError::BodyValidationFailed { definition, .. } => assert_eq!(definition, "Aged"),
            other => panic!("unexpected {:?}", other),
        }

        let garbage = RawRequest::new(HttpVerb::Post, "/users").body("not json");
        assert_eq!(
            resolver.resolve(&matched, &garbage).unwrap_err().kind(),
            ErrorKind::BodyValidationFailed
        );
    }

    #[test]
    fn test_header_value_stays_inside_backend_path_segment() {
        let inbound = InboundRequest {
            headers: vec![query("X-User", ParamType::String, true)],
            ..Default::default()
        };
        let method = http_method(inbound, "/v2/users/:uid", vec![rule("header.x-user", "path.uid")]);
        let (index, resolver) = compile("/users", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();

        let request = RawRequest::new(HttpVerb::Post, "/users").header("x-user", "1/../../admin?drop=1#x");
        let call = resolver.resolve(&matched, &request).unwrap();
        let http = call.as_http().unwrap();
        assert_eq!(http.uri(), "http://users:8080/v2/users/1%2F..%2F..%2Fadmin%3Fdrop%3D1%23x");
        assert!(http.query.is_empty());

        let request = RawRequest::new(HttpVerb::Post, "/users").header("x-user", "..");
        let err = resolver.resolve(&matched, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPathValue);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_non_json_body_read_by_rules_is_client_error() {
        let method = http_method(InboundRequest::default(), "", vec![rule("body.name", "header.X-Name")]);
        let (index, resolver) = compile("/users", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/users").unwrap();

        let garbage = RawRequest::new(HttpVerb::Post, "/users").body("name=ann");
        let err = resolver.resolve(&matched, &garbage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedBody);
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let ok = RawRequest::new(HttpVerb::Post, "/users").json(&json!({"name": "ann"}));
        let call = resolver.resolve(&matched, &ok).unwrap();
        assert_eq!(call.as_http().unwrap().headers["X-Name"], "ann");
    }

    #[test]
    fn test_dubbo_argument_without_param_types_fails_compile() {
        let method = Method {
            on_air: true,
            timeout: None,
            mock: false,
            filters: Vec::new(),
            http_verb: HttpVerb::Post,
            inbound_request: InboundRequest::default(),
            integration_request: IntegrationRequest {
                backend: Backend::Dubbo(DubboBackendConfig {
                    interface: "com.example.UserService".into(),
                    method: "find".into(),
                    ..Default::default()
                }),
                mapping_params: vec![rule("path.id", "18446744073709551615")],
            },
        };
        let err = RouteIndex::compile(APIConfig {
            resources: vec![Resource {
                path: "/users/:id".into(),
                methods: vec![method],
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_raw_body_forwarded_without_body_rules() {
        let method = http_method(InboundRequest::default(), "", vec![]);
        let (index, resolver) = compile("/upload", method, vec![]);
        let matched = index.find(&HttpVerb::Post, "/upload").unwrap();
        let call = resolver
            .resolve(&matched, &RawRequest::new(HttpVerb::Post, "/upload").body("raw bytes"))
            .unwrap();
        let http = call.as_http().unwrap();
        assert_eq!(http.body, None);
        assert_eq!(&http.raw_body[..], b"raw bytes");
    }
}
