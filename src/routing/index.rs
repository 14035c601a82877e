//! Compiled route index.
//!
//! # Responsibilities
//! - Flatten the resource tree into effective path templates
//! - Compile methods (effective timeout, filter chain, mapping rules)
//! - Look up the route and method for a verb + path
//!
//! # Design Decisions
//! - Routes live in an arena indexed by id; the trie only stores ids
//! - Immutable after construction (thread-safe without locks)
//! - Disabled methods stay in the arena for introspection but never match

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::schema::{APIConfig, Definition, HttpVerb, InboundRequest, Method, Resource};
use crate::config::validation::{validate_api_config, ValidationErrors};
use crate::error::GatewayError;
use crate::mapping::rules::CompiledIntegration;
use crate::routing::path;
use crate::routing::trie::Node;

/// Compilation switches.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Keep the first of several resources with the same effective path
    /// instead of rejecting the configuration.
    pub allow_duplicate_paths: bool,
}

/// A resource with at least one method, flattened to its effective path.
#[derive(Debug)]
pub struct CompiledRoute {
    pub id: usize,
    /// Effective path template, e.g. `/api/users/:id`.
    pub path: String,
    /// Informational resource type tag.
    pub kind: String,
    /// Capture names, in path order.
    pub captures: Vec<String>,
    /// Static header requirements, ancestor-to-leaf.
    pub headers: Vec<(String, String)>,
    /// Resource filters, ancestor-to-leaf.
    pub filters: Vec<String>,
    /// Timeout of the nearest resource that sets one.
    pub timeout: Option<Duration>,
    pub methods: Vec<CompiledMethod>,
}

impl CompiledRoute {
    /// A route with no method on air does not exist for matching.
    pub fn is_visible(&self) -> bool {
        self.methods.iter().any(|m| m.on_air)
    }

    /// Exact verb first, then `ANY`.
    pub fn dispatch(&self, verb: &HttpVerb) -> Option<&CompiledMethod> {
        let live = || self.methods.iter().filter(|m| m.on_air);
        live()
            .find(|m| &m.verb == verb)
            .or_else(|| live().find(|m| m.verb == HttpVerb::Any))
    }

    /// Verbs that are on air, in declaration order.
    pub fn allowed_verbs(&self) -> Vec<HttpVerb> {
        self.methods
            .iter()
            .filter(|m| m.on_air)
            .map(|m| m.verb.clone())
            .collect()
    }
}

/// A method ready for per-request resolution.
#[derive(Debug)]
pub struct CompiledMethod {
    /// Position within the route's methods.
    pub slot: usize,
    pub verb: HttpVerb,
    pub on_air: bool,
    pub mock: bool,
    /// Method timeout, or the nearest resource timeout.
    pub timeout: Option<Duration>,
    /// Full filter chain: resource filters ancestor-to-leaf, then the method's.
    pub filters: Vec<String>,
    pub inbound: InboundRequest,
    pub integration: CompiledIntegration,
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct MatchedMethod<'a> {
    pub route: &'a CompiledRoute,
    pub method: &'a CompiledMethod,
    /// The verb of the request (may differ from `method.verb` for `ANY`).
    pub verb: HttpVerb,
    /// Captured path variables, in path order.
    pub path_params: Vec<(String, String)>,
}

impl MatchedMethod<'_> {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Introspection entry: one declared method on one effective path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteSummary {
    pub path: String,
    pub verb: HttpVerb,
    pub on_air: bool,
    pub mock: bool,
}

/// Immutable lookup structure compiled from an [`APIConfig`].
#[derive(Debug)]
pub struct RouteIndex {
    name: String,
    description: String,
    routes: Vec<CompiledRoute>,
    root: Node,
    definitions: HashMap<String, Definition>,
}

impl RouteIndex {
    /// Compile with default options.
    pub fn compile(config: APIConfig) -> Result<Self, GatewayError> {
        Self::compile_with(config, &CompileOptions::default())
    }

    /// Compile, failing with every configuration problem found.
    pub fn compile_with(config: APIConfig, options: &CompileOptions) -> Result<Self, GatewayError> {
        let mut errors = ValidationErrors::default();
        validate_api_config(&config, &mut errors);

        let mut builder = Builder {
            options,
            routes: Vec::new(),
            root: Node::default(),
            errors,
        };
        let scope = Inherited::default();
        for resource in &config.resources {
            builder.add_resource(resource, &scope);
        }

        if !builder.errors.is_empty() {
            tracing::warn!(
                config = %config.name,
                errors = builder.errors.len(),
                "Route compilation failed"
            );
            return Err(GatewayError::Configuration(builder.errors));
        }

        let definitions = config
            .definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let index = Self {
            name: config.name,
            description: config.description,
            routes: builder.routes,
            root: builder.root,
            definitions,
        };
        tracing::info!(
            config = %index.name,
            routes = index.routes.len(),
            methods = index.routes.iter().map(|r| r.methods.len()).sum::<usize>(),
            "Route index compiled"
        );
        Ok(index)
    }

    /// Resolve `verb` + `path` to exactly one method.
    ///
    /// Fails with `RouteNotFound` when no visible route matches the path and
    /// `MethodNotAllowed` when the route exists but no live method accepts
    /// the verb.
    pub fn find(&self, verb: &HttpVerb, request_path: &str) -> Result<MatchedMethod<'_>, GatewayError> {
        let segments: Vec<&str> = path::split(request_path).collect();
        let mut captures = Vec::new();
        let visible = |id: usize| self.routes[id].is_visible();

        let Some(id) = self.root.find(&segments, &mut captures, &visible) else {
            return Err(GatewayError::RouteNotFound {
                verb: verb.clone(),
                path: request_path.to_string(),
            });
        };
        let route = &self.routes[id];

        let Some(method) = route.dispatch(verb) else {
            return Err(GatewayError::MethodNotAllowed {
                verb: verb.clone(),
                path: request_path.to_string(),
                allowed: route.allowed_verbs(),
            });
        };

        Ok(MatchedMethod {
            route,
            method,
            verb: verb.clone(),
            path_params: route
                .captures
                .iter()
                .cloned()
                .zip(captures.iter().map(|raw| path::decode(raw)))
                .collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Every declared method, disabled ones included.
    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.routes
            .iter()
            .flat_map(|route| {
                route.methods.iter().map(move |method| RouteSummary {
                    path: route.path.clone(),
                    verb: method.verb.clone(),
                    on_air: method.on_air,
                    mock: method.mock,
                })
            })
            .collect()
    }

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }
}

/// What a resource inherits from its ancestors.
#[derive(Debug, Clone, Default)]
struct Inherited {
    path: String,
    headers: Vec<(String, String)>,
    filters: Vec<String>,
    timeout: Option<Duration>,
}

struct Builder<'o> {
    options: &'o CompileOptions,
    routes: Vec<CompiledRoute>,
    root: Node,
    errors: ValidationErrors,
}

impl Builder<'_> {
    fn add_resource(&mut self, resource: &Resource, parent: &Inherited) {
        let mut scope = parent.clone();
        scope.path = path::join(&parent.path, &resource.path);
        scope.headers.extend(
            resource
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        // Chain collisions were rejected by validation before building.
        scope.filters.extend(resource.filters.iter().cloned());
        if let Some(timeout) = non_zero(resource.timeout) {
            scope.timeout = Some(timeout);
        }

        if !resource.methods.is_empty() {
            self.add_route(resource, &scope);
        }
        for child in &resource.resources {
            self.add_resource(child, &scope);
        }
    }

    fn add_route(&mut self, resource: &Resource, scope: &Inherited) {
        let location = format!("resource '{}'", scope.path);
        let segments = match path::parse_template(&scope.path) {
            Ok(segments) => segments,
            Err(e) => {
                self.errors.push(&location, e);
                return;
            }
        };

        let id = self.routes.len();
        if let Err(existing) = self.root.insert(&segments, id) {
            let first = &self.routes[existing].path;
            if self.options.allow_duplicate_paths {
                tracing::warn!(
                    path = %scope.path,
                    first = %first,
                    "Duplicate route ignored; first declaration wins"
                );
            } else {
                self.errors
                    .push(&location, format!("duplicates the path of '{}'", first));
            }
            return;
        }

        let methods = resource
            .methods
            .iter()
            .enumerate()
            .map(|(slot, method)| self.compile_method(slot, method, scope, &location))
            .collect();

        self.routes.push(CompiledRoute {
            id,
            path: scope.path.clone(),
            kind: resource.kind.clone(),
            captures: path::capture_names(&segments),
            headers: scope.headers.clone(),
            filters: scope.filters.clone(),
            timeout: scope.timeout,
            methods,
        });
    }

    fn compile_method(&mut self, slot: usize, method: &Method, scope: &Inherited, location: &str) -> CompiledMethod {
        let location = format!("{} method {}", location, method.http_verb);
        let integration =
            CompiledIntegration::compile(&method.integration_request, &location, &mut self.errors);

        let mut filters = scope.filters.clone();
        filters.extend(method.filters.iter().cloned());

        if !method.on_air {
            tracing::debug!(%location, "Method is off air");
        }

        CompiledMethod {
            slot,
            verb: method.http_verb.clone(),
            on_air: method.on_air,
            mock: method.mock,
            timeout: non_zero(method.timeout).or(scope.timeout),
            filters,
            inbound: method.inbound_request.clone(),
            integration,
        }
    }
}

// Zero durations are how unset timeouts look in many existing configs.
fn non_zero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::IntegrationRequest;
    use crate::error::ErrorKind;

    fn method(verb: HttpVerb, on_air: bool) -> Method {
        Method {
            on_air,
            timeout: None,
            mock: true,
            filters: Vec::new(),
            http_verb: verb,
            inbound_request: InboundRequest::default(),
            integration_request: IntegrationRequest::default(),
        }
    }

    fn resource(path: &str, methods: Vec<Method>) -> Resource {
        Resource {
            path: path.into(),
            methods,
            ..Default::default()
        }
    }

    fn config(resources: Vec<Resource>) -> APIConfig {
        APIConfig {
            name: "test".into(),
            resources,
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_paths_inherit_prefix_filters_and_timeout() {
        let mut parent = resource("/api", vec![]);
        parent.filters = vec!["auth".into()];
        parent.timeout = Some(Duration::from_secs(3));
        parent.headers.insert("x-tenant".into(), "acme".into());
        let mut child_method = method(HttpVerb::Get, true);
        child_method.filters = vec!["audit".into()];
        let mut child = resource("/users/:id", vec![child_method]);
        child.filters = vec!["ratelimit".into()];
        parent.resources.push(child);

        let index = RouteIndex::compile(config(vec![parent])).unwrap();
        assert_eq!(index.routes().len(), 1);

        let matched = index.find(&HttpVerb::Get, "/api/users/9").unwrap();
        assert_eq!(matched.route.path, "/api/users/:id");
        assert_eq!(matched.path_param("id"), Some("9"));
        assert_eq!(matched.method.filters, vec!["auth", "ratelimit", "audit"]);
        assert_eq!(matched.method.timeout, Some(Duration::from_secs(3)));
        assert_eq!(matched.route.headers, vec![("x-tenant".to_string(), "acme".to_string())]);
    }

    #[test]
    fn test_filter_repeated_down_the_tree_is_rejected() {
        let mut parent = resource("/api", vec![]);
        parent.filters = vec!["auth".into(), "audit".into()];
        let mut child_method = method(HttpVerb::Get, true);
        child_method.filters = vec!["auth".into(), "trace".into()];
        parent.resources.push(resource("/items", vec![child_method]));

        let err = RouteIndex::compile(config(vec![parent])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("'auth' is already in the chain"), "{}", err);
    }

    #[test]
    fn test_captured_values_are_percent_decoded() {
        let index = RouteIndex::compile(config(vec![
            resource("/users/:id", vec![method(HttpVerb::Get, true)]),
            resource("/files/*rest", vec![method(HttpVerb::Get, true)]),
        ]))
        .unwrap();
        let matched = index.find(&HttpVerb::Get, "/users/ann%20lee").unwrap();
        assert_eq!(matched.path_param("id"), Some("ann lee"));
        let matched = index.find(&HttpVerb::Get, "/files/a%2Fb/c").unwrap();
        assert_eq!(matched.path_param("rest"), Some("a/b/c"));
    }

    #[test]
    fn test_exact_verb_then_any_then_not_allowed() {
        let index = RouteIndex::compile(config(vec![
            resource("/orders", vec![method(HttpVerb::Get, true), method(HttpVerb::Any, true)]),
            resource("/items", vec![method(HttpVerb::Get, true)]),
        ]))
        .unwrap();

        assert_eq!(index.find(&HttpVerb::Get, "/orders").unwrap().method.verb, HttpVerb::Get);
        let fallback = index.find(&HttpVerb::Delete, "/orders").unwrap();
        assert_eq!(fallback.method.verb, HttpVerb::Any);
        assert_eq!(fallback.verb, HttpVerb::Delete);

        let err = index.find(&HttpVerb::Post, "/items").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MethodNotAllowed);
        let err = index.find(&HttpVerb::Get, "/nothing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RouteNotFound);
    }

    #[test]
    fn test_off_air_methods_are_invisible() {
        let index = RouteIndex::compile(config(vec![
            resource("/ping", vec![method(HttpVerb::Get, false)]),
            resource("/mixed", vec![method(HttpVerb::Get, false), method(HttpVerb::Post, true)]),
        ]))
        .unwrap();

        let err = index.find(&HttpVerb::Get, "/ping").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RouteNotFound);

        let err = index.find(&HttpVerb::Get, "/mixed").unwrap_err();
        match err {
            GatewayError::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, vec![HttpVerb::Post]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(index.summaries().len(), 3);
    }

    #[test]
    fn test_off_air_literal_falls_through_to_variable_route() {
        let index = RouteIndex::compile(config(vec![
            resource("/users/active", vec![method(HttpVerb::Get, false)]),
            resource("/users/:id", vec![method(HttpVerb::Get, true)]),
        ]))
        .unwrap();
        let matched = index.find(&HttpVerb::Get, "/users/active").unwrap();
        assert_eq!(matched.route.path, "/users/:id");
        assert_eq!(matched.path_param("id"), Some("active"));
    }

    #[test]
    fn test_duplicate_paths_rejected_or_first_wins() {
        let mut first = method(HttpVerb::Get, true);
        first.timeout = Some(Duration::from_secs(1));
        let build = || {
            config(vec![
                resource("/users/:id", vec![first.clone()]),
                resource("/users/{uid}", vec![method(HttpVerb::Get, true)]),
            ])
        };

        let err = RouteIndex::compile(build()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let options = CompileOptions {
            allow_duplicate_paths: true,
        };
        let index = RouteIndex::compile_with(build(), &options).unwrap();
        let matched = index.find(&HttpVerb::Get, "/users/1").unwrap();
        assert_eq!(matched.method.timeout, Some(Duration::from_secs(1)));
        assert_eq!(index.routes().len(), 1);
    }

    #[test]
    fn test_all_problems_are_reported_together() {
        let err = RouteIndex::compile(config(vec![
            resource("/a/*rest/b", vec![method(HttpVerb::Get, true)]),
            resource("/b", vec![method(HttpVerb::Get, true), method(HttpVerb::Get, true)]),
        ]))
        .unwrap_err();
        match err {
            GatewayError::Configuration(errors) => assert_eq!(errors.len(), 2, "{}", errors),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resources_without_methods_are_only_prefixes() {
        let mut parent = resource("/api", vec![]);
        parent.resources.push(resource("/health", vec![method(HttpVerb::Get, true)]));
        let index = RouteIndex::compile(config(vec![parent])).unwrap();
        assert_eq!(
            index.find(&HttpVerb::Get, "/api").unwrap_err().kind(),
            ErrorKind::RouteNotFound
        );
        assert!(index.find(&HttpVerb::Get, "/api/health/").is_ok());
    }
}
