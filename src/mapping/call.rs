//! Fully resolved backend invocation.
//!
//! An [`IntegrationCall`] starts as a copy of the static backend config and
//! is filled in rule by rule. It is serializable so mock responses and the
//! CLI can show exactly what would be sent.

use std::collections::BTreeMap;

use axum::body::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::schema::{Backend, DubboBackendConfig, HttpBackendConfig, HttpVerb, RequestType};
use crate::mapping::rules::{DubboField, MappingTarget};

/// What the gateway will send to a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationCall {
    pub protocol: RequestType,
    pub target: CallTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallTarget {
    Dubbo(DubboCall),
    Http(HttpCall),
    Generic(GenericCall),
}

/// RPC invocation with positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DubboCall {
    pub cluster_name: String,
    pub application: String,
    pub protocol: String,
    pub interface: String,
    pub method: String,
    pub group: String,
    pub version: String,
    pub param_types: Vec<String>,
    pub args: Vec<Value>,
    pub retries: u32,
}

/// Outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCall {
    pub verb: HttpVerb,
    /// `scheme://host[:port]` or the configured url, without trailing slash.
    pub base_url: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Inbound body, forwarded when no rule builds a JSON body.
    #[serde(skip)]
    pub raw_body: Bytes,
}

impl HttpCall {
    /// Absolute URI including the encoded query string.
    pub fn uri(&self) -> String {
        let mut uri = format!("{}{}", self.base_url, self.path);
        if !self.query.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            uri.push('?');
            uri.push_str(&query);
        }
        uri
    }
}

/// Call for a protocol without native support: named parameters only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenericCall {
    pub params: Map<String, Value>,
}

impl IntegrationCall {
    /// Seed a call from the static backend config.
    pub fn from_backend(backend: &Backend, verb: &HttpVerb) -> Self {
        let target = match backend {
            Backend::Dubbo(config) => CallTarget::Dubbo(DubboCall::from_config(config)),
            Backend::Http(config) => CallTarget::Http(HttpCall::from_config(config, verb)),
            Backend::Unknown(_) => CallTarget::Generic(GenericCall { params: Map::new() }),
        };
        Self {
            protocol: backend.request_type(),
            target,
        }
    }

    /// Write `value` into `target`. Later writes to the same target win.
    pub fn assign(&mut self, target: &MappingTarget, value: Value) {
        match (&mut self.target, target) {
            (CallTarget::Dubbo(call), MappingTarget::Argument(index)) => {
                // Arity is fixed by paramTypes; compiled rules never exceed it.
                match call.args.get_mut(*index) {
                    Some(slot) => *slot = value,
                    None => tracing::warn!(
                        index = *index,
                        arity = call.param_types.len(),
                        "Dubbo argument index outside paramTypes ignored"
                    ),
                }
            }
            (CallTarget::Dubbo(call), MappingTarget::DubboField(field)) => {
                let text = value_to_string(&value);
                match field {
                    DubboField::Interface => call.interface = text,
                    DubboField::Method => call.method = text,
                    DubboField::Group => call.group = text,
                    DubboField::Version => call.version = text,
                    DubboField::Application => call.application = text,
                }
            }
            (CallTarget::Http(call), MappingTarget::Header(name)) => {
                call.headers.insert(name.clone(), value_to_string(&value));
            }
            (CallTarget::Http(call), MappingTarget::Query(name)) => {
                call.query.insert(name.clone(), value_to_string(&value));
            }
            (CallTarget::Http(call), MappingTarget::Body(path)) => {
                let body = call.body.get_or_insert_with(|| Value::Object(Map::new()));
                set_path(body, path, value);
            }
            (CallTarget::Generic(call), MappingTarget::Named(name)) => {
                call.params.insert(name.clone(), value);
            }
            (_, other) => {
                // Targets are compiled against the backend, so this only
                // happens for path variables, which the resolver renders itself.
                tracing::trace!(target_ref = ?other, "Mapping target not assignable on call");
            }
        }
    }

    pub fn as_http(&self) -> Option<&HttpCall> {
        match &self.target {
            CallTarget::Http(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_dubbo(&self) -> Option<&DubboCall> {
        match &self.target {
            CallTarget::Dubbo(call) => Some(call),
            _ => None,
        }
    }

    /// Retry budget declared by the backend config.
    pub fn retries(&self) -> u32 {
        match &self.target {
            CallTarget::Dubbo(call) => call.retries,
            _ => 0,
        }
    }
}

impl DubboCall {
    fn from_config(config: &DubboBackendConfig) -> Self {
        Self {
            cluster_name: config.cluster_name.clone(),
            application: config.application_name.clone(),
            protocol: config.protocol.clone(),
            interface: config.interface.clone(),
            method: config.method.clone(),
            group: config.group.clone(),
            version: config.version.clone(),
            param_types: config.param_types.clone(),
            args: vec![Value::Null; config.param_types.len()],
            retries: config.retry_count(),
        }
    }
}

impl HttpCall {
    fn from_config(config: &HttpBackendConfig, verb: &HttpVerb) -> Self {
        let base_url = if config.url.is_empty() {
            let scheme = if config.scheme.is_empty() { "http" } else { &config.scheme };
            format!("{}://{}", scheme, config.host)
        } else {
            config.url.trim_end_matches('/').to_string()
        };
        Self {
            verb: verb.clone(),
            base_url,
            path: String::from("/"),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            raw_body: Bytes::new(),
        }
    }
}

/// Text form of a JSON value; strings are not quoted.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Set `value` at `path` inside `root`, creating objects on the way.
fn set_path(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for key in parents {
        current = object(current)
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object(current).insert(last.clone(), value);
}

fn object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http_call() -> IntegrationCall {
        let backend = Backend::Http(HttpBackendConfig {
            host: "users:8080".into(),
            ..Default::default()
        });
        IntegrationCall::from_backend(&backend, &HttpVerb::Post)
    }

    #[test]
    fn test_body_targets_build_nested_json() {
        let mut call = http_call();
        call.assign(&MappingTarget::Body(vec!["user".into(), "name".into()]), json!("ann"));
        call.assign(&MappingTarget::Body(vec!["user".into(), "age".into()]), json!(30));
        call.assign(&MappingTarget::Body(vec!["tag".into()]), json!("x"));
        let body = call.as_http().unwrap().body.clone().unwrap();
        assert_eq!(body, json!({"user": {"name": "ann", "age": 30}, "tag": "x"}));
    }

    #[test]
    fn test_whole_body_then_field_overwrites_scalar() {
        let mut call = http_call();
        call.assign(&MappingTarget::Body(vec![]), json!("scalar"));
        call.assign(&MappingTarget::Body(vec!["a".into()]), json!(1));
        assert_eq!(call.as_http().unwrap().body, Some(json!({"a": 1})));
    }

    #[test]
    fn test_dubbo_arguments_are_positional() {
        let backend = Backend::Dubbo(DubboBackendConfig {
            interface: "com.example.Svc".into(),
            method: "call".into(),
            param_types: vec!["a".into(), "b".into(), "c".into()],
            retries: "2".into(),
            ..Default::default()
        });
        let mut call = IntegrationCall::from_backend(&backend, &HttpVerb::Get);
        call.assign(&MappingTarget::Argument(2), json!("third"));
        call.assign(&MappingTarget::Argument(0), json!(1));
        call.assign(&MappingTarget::DubboField(DubboField::Version), json!(2));
        let dubbo = call.as_dubbo().unwrap();
        assert_eq!(dubbo.args, vec![json!(1), Value::Null, json!("third")]);
        assert_eq!(dubbo.version, "2");
        assert_eq!(call.retries(), 2);
    }

    #[test]
    fn test_dubbo_argument_outside_arity_is_ignored() {
        let backend = Backend::Dubbo(DubboBackendConfig {
            interface: "com.example.Svc".into(),
            method: "call".into(),
            param_types: vec!["a".into()],
            ..Default::default()
        });
        let mut call = IntegrationCall::from_backend(&backend, &HttpVerb::Get);
        call.assign(&MappingTarget::Argument(usize::MAX), json!("x"));
        call.assign(&MappingTarget::Argument(1_000_000_000), json!("y"));
        call.assign(&MappingTarget::Argument(0), json!("z"));
        assert_eq!(call.as_dubbo().unwrap().args, vec![json!("z")]);
    }

    #[test]
    fn test_uri_encodes_query() {
        let mut call = http_call();
        call.assign(&MappingTarget::Query("q".into()), json!("a b"));
        let CallTarget::Http(http) = &mut call.target else {
            panic!("expected http target");
        };
        http.path = "/search".into();
        assert_eq!(http.uri(), "http://users:8080/search?q=a+b");
    }
}
