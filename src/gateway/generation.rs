//! Compiled configuration generations.
//!
//! A [`Generation`] is everything a request needs that derives from one
//! APIConfig: the route index, the schema validator, and the filter chain
//! of every method. It is built completely (or not at all) before it can be
//! activated, and never changes afterwards.

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::APIConfig;
use crate::config::validation::ValidationErrors;
use crate::error::GatewayError;
use crate::filter::{FilterChain, FilterRegistry};
use crate::integration::DispatcherRegistry;
use crate::mapping::{JsonSchemaValidator, OptionRegistry, ParameterResolver, SchemaValidator};
use crate::routing::{CompileOptions, MatchedMethod, RouteIndex};

/// Long-lived collaborators shared by every generation.
#[derive(Clone)]
pub struct Components {
    pub filters: FilterRegistry,
    pub options: Arc<OptionRegistry>,
    pub dispatchers: DispatcherRegistry,
    pub compile: CompileOptions,
    /// Timeout when neither the method nor a resource sets one.
    pub default_timeout: Duration,
    /// Replaces the per-generation JSON-schema validator when set.
    pub schema_validator: Option<Arc<dyn SchemaValidator>>,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            filters: FilterRegistry::with_builtins(),
            options: Arc::new(OptionRegistry::with_builtins()),
            dispatchers: DispatcherRegistry::new(),
            compile: CompileOptions::default(),
            default_timeout: Duration::from_secs(30),
            schema_validator: None,
        }
    }
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Components")
            .field("filters", &self.filters)
            .field("options", &self.options)
            .field("dispatchers", &self.dispatchers)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// One immutable, fully validated configuration.
pub struct Generation {
    id: u64,
    index: RouteIndex,
    resolver: ParameterResolver,
    /// Filter chains by route id, then method slot.
    chains: Vec<Vec<FilterChain>>,
}

impl Generation {
    /// Compile `config` and bind every name it uses.
    ///
    /// Fails with `Configuration` listing every problem, or with
    /// `UnknownOption` when a rule opens an option nobody registered.
    pub fn build(id: u64, config: APIConfig, components: &Components) -> Result<Self, GatewayError> {
        let index = RouteIndex::compile_with(config, &components.compile)?;

        let mut errors = ValidationErrors::default();
        let mut unknown_option = None;
        let mut chains = Vec::with_capacity(index.routes().len());
        for route in index.routes() {
            let mut route_chains = Vec::with_capacity(route.methods.len());
            for method in &route.methods {
                let location = format!("resource '{}' method {}", route.path, method.verb);
                route_chains.push(components.filters.chain(&method.filters, &location, &mut errors));
                if unknown_option.is_none() {
                    unknown_option = method
                        .integration
                        .option_names()
                        .find(|name| !components.options.contains(name))
                        .map(str::to_string);
                }
            }
            chains.push(route_chains);
        }

        let validator: Arc<dyn SchemaValidator> = match &components.schema_validator {
            Some(validator) => Arc::clone(validator),
            None => match JsonSchemaValidator::compile(&index) {
                Ok(validator) => Arc::new(validator),
                Err(schema_errors) => {
                    errors.0.extend(schema_errors.0);
                    Arc::new(JsonSchemaValidator::default())
                }
            },
        };

        if !errors.is_empty() {
            return Err(GatewayError::Configuration(errors));
        }
        if let Some(name) = unknown_option {
            return Err(GatewayError::UnknownOption(name));
        }

        Ok(Self {
            id,
            index,
            resolver: ParameterResolver::new(Arc::clone(&components.options), validator),
            chains,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn index(&self) -> &RouteIndex {
        &self.index
    }

    pub fn resolver(&self) -> &ParameterResolver {
        &self.resolver
    }

    /// Filter chain of a matched method.
    pub fn chain(&self, matched: &MatchedMethod<'_>) -> Option<&FilterChain> {
        self.chains
            .get(matched.route.id)
            .and_then(|chains| chains.get(matched.method.slot))
    }
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("name", &self.index.name())
            .field("routes", &self.index.routes().len())
            .finish()
    }
}
