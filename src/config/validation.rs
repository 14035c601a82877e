//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (body definitions exist, filter chains are
//!   collision free)
//! - Validate value ranges and protocol-specific required fields
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config
//! - Path templates and mapping rules are checked by the route compiler,
//!   which reports into the same error list

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{
    APIConfig, Backend, DubboBackendConfig, HttpBackendConfig, HttpVerb, Method, ParamType,
    Params, Resource,
};
use crate::config::settings::GatewaySettings;
use crate::routing::path;

/// A single configuration problem and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub location: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Every problem found in one configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn push(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError::new(location, message));
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

/// Validate process settings.
pub fn validate_settings(settings: &GatewaySettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", settings.listener.bind_address),
        ));
    }
    if settings.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if settings.timeouts.default_request.is_zero() {
        errors.push(ValidationError::new("timeouts.default_request", "must be greater than 0"));
    }
    if settings.retries.enabled && settings.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if settings.retries.base_delay_ms > settings.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }
    if settings.observability.metrics_enabled
        && settings.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", settings.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Model-level checks on an API configuration.
///
/// Problems are appended to `errors`; the route compiler adds its own.
pub fn validate_api_config(config: &APIConfig, errors: &mut ValidationErrors) {
    let mut definitions = HashSet::new();
    for (i, definition) in config.definitions.iter().enumerate() {
        let location = format!("definitions[{}]", i);
        if definition.name.is_empty() {
            errors.push(location, "definition name is empty");
            continue;
        }
        if !definitions.insert(definition.name.as_str()) {
            errors.push(location, format!("duplicate definition '{}'", definition.name));
        }
    }

    for resource in &config.resources {
        validate_resource(resource, "", &[], &definitions, errors);
    }
}

fn validate_resource(
    resource: &Resource,
    parent_path: &str,
    parent_filters: &[String],
    definitions: &HashSet<&str>,
    errors: &mut ValidationErrors,
) {
    let full_path = path::join(parent_path, &resource.path);
    let location = format!("resource '{}'", full_path);

    let chain = extend_filter_chain(parent_filters, &resource.filters, &location, errors);

    for (name, value) in &resource.headers {
        if name.trim().is_empty() {
            errors.push(&location, format!("static header with empty name (value '{}')", value));
        }
    }

    let mut verbs: HashSet<&HttpVerb> = HashSet::new();
    for method in &resource.methods {
        let method_location = format!("{} method {}", location, method.http_verb);
        if let HttpVerb::Unknown(raw) = &method.http_verb {
            errors.push(&method_location, format!("unsupported http verb '{}'", raw));
        }
        if !verbs.insert(&method.http_verb) {
            errors.push(&method_location, "duplicate http verb on resource");
        }
        validate_method(method, &chain, definitions, &method_location, errors);
    }

    for child in &resource.resources {
        validate_resource(child, &full_path, &chain, definitions, errors);
    }
}

fn validate_method(
    method: &Method,
    resource_filters: &[String],
    definitions: &HashSet<&str>,
    location: &str,
    errors: &mut ValidationErrors,
) {
    extend_filter_chain(resource_filters, &method.filters, location, errors);

    let inbound = &method.inbound_request;
    validate_params(&inbound.headers, "header", location, errors);
    validate_params(&inbound.query_strings, "query", location, errors);
    for body in &inbound.request_body {
        if !definitions.contains(body.definition_name.as_str()) {
            errors.push(
                location,
                format!("request body references unknown definition '{}'", body.definition_name),
            );
        }
    }

    match &method.integration_request.backend {
        Backend::Dubbo(config) => validate_dubbo_backend(config, method.mock, location, errors),
        Backend::Http(config) => validate_http_backend(config, method.mock, location, errors),
        Backend::Unknown(tag) => {
            tracing::warn!(%location, protocol = %tag, "Integration protocol has no native support");
        }
    }

    for mapping in &method.integration_request.mapping_params {
        if mapping.opt.open && mapping.opt.usable && mapping.opt.name.trim().is_empty() {
            errors.push(
                location,
                format!("mapping '{}' opens an option without a name", mapping.name),
            );
        }
    }
}

fn validate_params(params: &[Params], scope: &str, location: &str, errors: &mut ValidationErrors) {
    let mut seen = HashSet::new();
    for param in params {
        if param.name.trim().is_empty() {
            errors.push(location, format!("{} parameter with empty name", scope));
            continue;
        }
        if !seen.insert(param.name.to_ascii_lowercase()) {
            errors.push(location, format!("duplicate {} parameter '{}'", scope, param.name));
        }
        if let ParamType::Unknown(raw) = &param.kind {
            errors.push(
                location,
                format!("{} parameter '{}' has unsupported type '{}'", scope, param.name, raw),
            );
        }
    }
}

fn validate_dubbo_backend(
    config: &DubboBackendConfig,
    mock: bool,
    location: &str,
    errors: &mut ValidationErrors,
) {
    if !mock {
        if config.interface.trim().is_empty() {
            errors.push(location, "dubbo backend requires an interface");
        }
        if config.method.trim().is_empty() {
            errors.push(location, "dubbo backend requires a method");
        }
    }
    if !config.retries.trim().is_empty() && config.retries.trim().parse::<u32>().is_err() {
        errors.push(location, format!("dubbo retries '{}' is not a number", config.retries));
    }
}

fn validate_http_backend(
    config: &HttpBackendConfig,
    mock: bool,
    location: &str,
    errors: &mut ValidationErrors,
) {
    if !config.url.is_empty() {
        match url::Url::parse(&config.url) {
            Ok(parsed) if parsed.has_host() => {}
            Ok(_) => errors.push(location, format!("http backend url '{}' has no host", config.url)),
            Err(e) => errors.push(location, format!("http backend url '{}': {}", config.url, e)),
        }
    } else if config.host.trim().is_empty() && !mock {
        errors.push(location, "http backend requires a url or a host");
    }
    match config.scheme.as_str() {
        "" | "http" | "https" => {}
        other => errors.push(location, format!("unsupported http scheme '{}'", other)),
    }
}

/// Append `own` to `inherited`, reporting names that appear twice.
fn extend_filter_chain(
    inherited: &[String],
    own: &[String],
    location: &str,
    errors: &mut ValidationErrors,
) -> Vec<String> {
    let mut chain = inherited.to_vec();
    for name in own {
        if chain.contains(name) {
            errors.push(location, format!("filter '{}' is already in the chain", name));
        } else {
            chain.push(name.clone());
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BodyDefinition, Definition, InboundRequest, IntegrationRequest};

    fn method(verb: HttpVerb) -> Method {
        Method {
            on_air: true,
            timeout: None,
            mock: true,
            filters: Vec::new(),
            http_verb: verb,
            inbound_request: InboundRequest::default(),
            integration_request: IntegrationRequest::default(),
        }
    }

    fn collect(config: &APIConfig) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        validate_api_config(config, &mut errors);
        errors
    }

    #[test]
    fn test_duplicate_verbs_are_reported() {
        let config = APIConfig {
            resources: vec![Resource {
                path: "/ping".into(),
                methods: vec![method(HttpVerb::Get), method(HttpVerb::Get), method(HttpVerb::Any)],
                ..Default::default()
            }],
            ..Default::default()
        };
        let errors = collect(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors.0[0].message.contains("duplicate http verb"));
    }

    #[test]
    fn test_dangling_definition_and_bad_param_type() {
        let mut m = method(HttpVerb::Post);
        m.inbound_request.request_body.push(BodyDefinition {
            definition_name: "User".into(),
        });
        m.inbound_request.query_strings.push(Params {
            name: "limit".into(),
            kind: ParamType::Unknown("decimal".into()),
            required: false,
        });
        let config = APIConfig {
            resources: vec![Resource {
                path: "/users".into(),
                methods: vec![m],
                ..Default::default()
            }],
            definitions: vec![Definition {
                name: "Order".into(),
                schema: "{}".into(),
            }],
            ..Default::default()
        };
        let errors = collect(&config);
        assert_eq!(errors.len(), 2, "{}", errors);
    }

    #[test]
    fn test_filter_collision_between_levels() {
        let mut m = method(HttpVerb::Get);
        m.filters = vec!["auth".into()];
        let config = APIConfig {
            resources: vec![Resource {
                path: "/api".into(),
                filters: vec!["auth".into()],
                resources: vec![Resource {
                    path: "/orders".into(),
                    filters: vec!["auth".into(), "audit".into()],
                    methods: vec![m],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let errors = collect(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors.0[0].location.contains("/api/orders"));
    }

    #[test]
    fn test_http_backend_needs_target_unless_mocked() {
        let mut m = method(HttpVerb::Get);
        m.mock = false;
        let config = APIConfig {
            resources: vec![Resource {
                path: "/x".into(),
                methods: vec![m],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(collect(&config).len(), 1);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = GatewaySettings::default();
        assert!(validate_settings(&settings).is_ok());

        settings.listener.bind_address = "not-an-address".into();
        settings.retries.base_delay_ms = 5000;
        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
