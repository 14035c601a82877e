//! API configuration schema definitions.
//!
//! This module defines the declarative route tree consumed by the gateway:
//! `APIConfig → Resource → Method → InboundRequest / IntegrationRequest →
//! MappingParam`. All types derive Serde traits; the camelCase field names
//! are the compatibility contract for every loader (YAML, JSON, TOML).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP verb a [`Method`] binds to.
///
/// `Any` is the per-resource wildcard fallback. Verbs this gateway does not
/// know are kept as `Unknown` so that newer configs still deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum HttpVerb {
    Any,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Unknown(String),
}

impl HttpVerb {
    /// Parse a verb, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ANY" => HttpVerb::Any,
            "GET" => HttpVerb::Get,
            "HEAD" => HttpVerb::Head,
            "POST" => HttpVerb::Post,
            "PUT" => HttpVerb::Put,
            "PATCH" => HttpVerb::Patch,
            "DELETE" => HttpVerb::Delete,
            "OPTIONS" => HttpVerb::Options,
            _ => HttpVerb::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpVerb::Any => "ANY",
            HttpVerb::Get => "GET",
            HttpVerb::Head => "HEAD",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Unknown(raw) => raw,
        }
    }

    /// Idempotent verbs may be retried by dispatchers.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            HttpVerb::Get | HttpVerb::Head | HttpVerb::Options | HttpVerb::Put | HttpVerb::Delete
        )
    }
}

impl Default for HttpVerb {
    fn default() -> Self {
        HttpVerb::Get
    }
}

impl From<String> for HttpVerb {
    fn from(raw: String) -> Self {
        HttpVerb::parse(&raw)
    }
}

impl From<HttpVerb> for String {
    fn from(verb: HttpVerb) -> Self {
        verb.as_str().to_string()
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol of an inbound or integration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    #[default]
    Http,
    Dubbo,
    Unknown(String),
}

impl RequestType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "http" => RequestType::Http,
            "dubbo" => RequestType::Dubbo,
            _ => RequestType::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Http => "http",
            RequestType::Dubbo => "dubbo",
            RequestType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for RequestType {
    fn from(raw: String) -> Self {
        RequestType::parse(&raw)
    }
}

impl From<RequestType> for String {
    fn from(kind: RequestType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive type tag of an inbound parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Unknown(String),
}

impl ParamType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "string" | "str" => ParamType::String,
            "int" | "integer" | "long" | "int32" | "int64" => ParamType::Int,
            "float" | "double" | "number" => ParamType::Float,
            "bool" | "boolean" => ParamType::Bool,
            _ => ParamType::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ParamType {
    fn from(raw: String) -> Self {
        ParamType::parse(&raw)
    }
}

impl From<ParamType> for String {
    fn from(kind: ParamType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of the API gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct APIConfig {
    pub name: String,

    pub description: String,

    /// Top-level resources, in declaration order.
    pub resources: Vec<Resource>,

    /// Request body schemas, referenced by name from `requestBody`.
    pub definitions: Vec<Definition>,
}

/// A node in the path tree.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resource {
    /// Category tag ("restful", "dubbo"); informational only.
    #[serde(rename = "type")]
    pub kind: String,

    /// Path template relative to the parent resource (e.g. `/user/:id`).
    pub path: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    pub description: String,

    /// Filter names applied to every method below this resource.
    pub filters: Vec<String>,

    pub methods: Vec<Method>,

    /// Child resources; their paths are appended to this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    /// Static header requirements (name → exact value).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// One HTTP verb binding within a resource.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    /// Disabled methods are invisible to route matching.
    #[serde(default)]
    pub on_air: bool,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Skip the backend and answer with a canned response.
    #[serde(default)]
    pub mock: bool,

    #[serde(default)]
    pub filters: Vec<String>,

    pub http_verb: HttpVerb,

    #[serde(default)]
    pub inbound_request: InboundRequest,

    #[serde(default)]
    pub integration_request: IntegrationRequest,
}

/// Client-facing request shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InboundRequest {
    pub request_type: RequestType,
    pub headers: Vec<Params>,
    pub query_strings: Vec<Params>,
    pub request_body: Vec<BodyDefinition>,
}

/// A declared header or query parameter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub required: bool,
}

/// Links the request body to a [`Definition`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BodyDefinition {
    pub definition_name: String,
}

/// Backend target of a method, keyed by its request type.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Dubbo(DubboBackendConfig),
    Http(HttpBackendConfig),
    /// A protocol this build has no native support for.
    Unknown(String),
}

impl Backend {
    pub fn request_type(&self) -> RequestType {
        match self {
            Backend::Dubbo(_) => RequestType::Dubbo,
            Backend::Http(_) => RequestType::Http,
            Backend::Unknown(tag) => RequestType::Unknown(tag.clone()),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Http(HttpBackendConfig::default())
    }
}

/// Backend-facing request: target plus mapping rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "IntegrationRequestWire", into = "IntegrationRequestWire")]
pub struct IntegrationRequest {
    pub backend: Backend,
    pub mapping_params: Vec<MappingParam>,
}

impl IntegrationRequest {
    pub fn request_type(&self) -> RequestType {
        self.backend.request_type()
    }
}

/// On-disk form: a `requestType` tag next to one config block per protocol.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
struct IntegrationRequestWire {
    request_type: RequestType,
    #[serde(skip_serializing_if = "Option::is_none")]
    dubbo_backend_config: Option<DubboBackendConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_backend_config: Option<HttpBackendConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    mapping_params: Vec<MappingParam>,
}

impl From<IntegrationRequestWire> for IntegrationRequest {
    fn from(wire: IntegrationRequestWire) -> Self {
        let backend = match wire.request_type {
            RequestType::Dubbo => Backend::Dubbo(wire.dubbo_backend_config.unwrap_or_default()),
            RequestType::Http => Backend::Http(wire.http_backend_config.unwrap_or_default()),
            RequestType::Unknown(tag) => Backend::Unknown(tag),
        };
        Self {
            backend,
            mapping_params: wire.mapping_params,
        }
    }
}

impl From<IntegrationRequest> for IntegrationRequestWire {
    fn from(request: IntegrationRequest) -> Self {
        let request_type = request.request_type();
        let (dubbo_backend_config, http_backend_config) = match request.backend {
            Backend::Dubbo(config) => (Some(config), None),
            Backend::Http(config) => (None, Some(config)),
            Backend::Unknown(_) => (None, None),
        };
        Self {
            request_type,
            dubbo_backend_config,
            http_backend_config,
            mapping_params: request.mapping_params,
        }
    }
}

/// A single field-mapping rule from an inbound source to a backend field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MappingParam {
    /// Source reference, `{scope}.{field}`.
    pub name: String,

    /// Destination reference in the backend call.
    pub map_to: String,

    pub opt: Opt,
}

/// Conditional-override descriptor of a mapping rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Opt {
    /// Option behaviour to run on the value.
    pub name: String,

    /// When false the whole descriptor is ignored.
    pub open: bool,

    /// Only read when `open` is set: true applies the rule, false skips it.
    pub usable: bool,
}

/// RPC backend target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DubboBackendConfig {
    pub cluster_name: String,
    pub application_name: String,
    pub protocol: String,
    pub group: String,
    pub version: String,
    pub interface: String,
    pub method: String,
    pub param_types: Vec<String>,
    pub to_param_types: Vec<String>,
    /// Retry count, kept as text for compatibility with existing configs.
    pub retries: String,
}

impl Default for DubboBackendConfig {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            application_name: String::new(),
            protocol: "dubbo".to_string(),
            group: String::new(),
            version: String::new(),
            interface: String::new(),
            method: String::new(),
            param_types: Vec::new(),
            to_param_types: Vec::new(),
            retries: String::new(),
        }
    }
}

impl DubboBackendConfig {
    /// Parsed `retries`; empty or malformed counts mean no retry.
    pub fn retry_count(&self) -> u32 {
        self.retries.trim().parse().unwrap_or(0)
    }
}

/// HTTP backend target.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// Full base URL; takes precedence over `scheme` + `host`.
    pub url: String,

    /// Downstream host (`host[:port]`).
    pub host: String,

    /// Backend path template; variables are filled by `path.*` mappings.
    pub path: String,

    /// `http` or `https`.
    #[serde(alias = "schema")]
    pub scheme: String,
}

/// JSON-schema document used to validate request bodies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Definition {
    pub name: String,
    pub schema: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parsing_keeps_unknown() {
        assert_eq!(HttpVerb::parse("get"), HttpVerb::Get);
        assert_eq!(HttpVerb::parse("Any"), HttpVerb::Any);
        assert_eq!(HttpVerb::parse("PURGE"), HttpVerb::Unknown("PURGE".into()));
        assert_eq!(HttpVerb::Unknown("PURGE".into()).to_string(), "PURGE");
    }

    #[test]
    fn test_integration_request_is_keyed_by_type() {
        let yaml = r#"
requestType: dubbo
dubboBackendConfig:
  interface: com.example.UserService
  method: queryUser
  paramTypes: ["java.lang.String"]
httpBackendConfig:
  host: ignored:8080
mappingParams:
  - name: path.id
    mapTo: "0"
"#;
        let request: IntegrationRequest = serde_yaml::from_str(yaml).unwrap();
        match &request.backend {
            Backend::Dubbo(config) => {
                assert_eq!(config.interface, "com.example.UserService");
                assert_eq!(config.protocol, "dubbo");
            }
            other => panic!("expected dubbo backend, got {:?}", other),
        }
        assert_eq!(request.mapping_params.len(), 1);
        assert!(!request.mapping_params[0].opt.open);
    }

    #[test]
    fn test_unknown_protocol_round_trips() {
        let json = r#"{"requestType":"grpc","mappingParams":[{"name":"query.q","mapTo":"q"}]}"#;
        let request: IntegrationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.backend, Backend::Unknown("grpc".into()));

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["requestType"], "grpc");
        assert!(encoded.get("dubboBackendConfig").is_none());
    }

    #[test]
    fn test_method_defaults_and_durations() {
        let yaml = r#"
path: /api/v1/user
timeout: 2s
methods:
  - httpVerb: GET
    onAir: true
    timeout: 500ms
  - httpVerb: POST
headers:
  x-tenant: acme
"#;
        let resource: Resource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(resource.timeout, Some(Duration::from_secs(2)));
        assert_eq!(resource.methods[0].timeout, Some(Duration::from_millis(500)));
        assert!(!resource.methods[1].on_air);
        assert_eq!(resource.methods[1].integration_request.request_type(), RequestType::Http);
        assert_eq!(resource.headers.get("x-tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_http_backend_accepts_schema_alias() {
        let config: HttpBackendConfig =
            serde_json::from_str(r#"{"host":"users:8080","schema":"https"}"#).unwrap();
        assert_eq!(config.scheme, "https");
    }

    #[test]
    fn test_retry_count() {
        let mut config = DubboBackendConfig::default();
        assert_eq!(config.retry_count(), 0);
        config.retries = " 3 ".into();
        assert_eq!(config.retry_count(), 3);
    }
}
