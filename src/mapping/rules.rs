//! Compiled mapping rules.
//!
//! `MappingParam` strings are parsed once per generation into typed source
//! references, destination targets and an [`OptMode`]. Bad references are
//! configuration errors reported at compile time.

use std::fmt;

use serde::Serialize;

use crate::config::schema::{Backend, IntegrationRequest, MappingParam, Opt};
use crate::config::validation::ValidationErrors;
use crate::routing::path::{self, Segment};

/// Where an inbound value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Header,
    Query,
    Path,
    Body,
}

impl Scope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "header" | "headers" => Some(Scope::Header),
            "query" | "queryStrings" | "querystrings" => Some(Scope::Query),
            "path" | "uri" => Some(Scope::Path),
            "body" | "requestBody" => Some(Scope::Body),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Header => "header",
            Scope::Query => "query",
            Scope::Path => "path",
            Scope::Body => "body",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `MappingParam.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub scope: Scope,
    /// Field name; for the body scope a dotted path, empty for the whole body.
    pub field: Vec<String>,
}

impl SourceRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let (scope_text, field) = match raw.split_once('.') {
            Some((scope, field)) => (scope, Some(field)),
            None => (raw, None),
        };
        let scope = Scope::parse(scope_text)
            .ok_or_else(|| format!("unknown source scope in '{}'", raw))?;

        let field = match (scope, field) {
            (Scope::Body, None) => Vec::new(),
            (Scope::Body, Some(path)) => dotted(path, raw)?,
            (_, Some(name)) if !name.is_empty() => vec![name.to_string()],
            _ => return Err(format!("source '{}' names no field", raw)),
        };
        Ok(Self { scope, field })
    }

    /// Single field name (header, query and path scopes).
    pub fn name(&self) -> &str {
        self.field.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.scope)
        } else {
            write!(f, "{}.{}", self.scope, self.field.join("."))
        }
    }
}

/// How a rule's [`Opt`] gates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptMode {
    /// `open = false`: the descriptor is ignored and the rule always applies.
    Inert,
    /// `open = true, usable = false`: the destination keeps its default.
    Skip,
    /// `open = true, usable = true`: apply after the named option runs.
    Transform(String),
}

impl From<&Opt> for OptMode {
    fn from(opt: &Opt) -> Self {
        match (opt.open, opt.usable) {
            (false, _) => OptMode::Inert,
            (true, false) => OptMode::Skip,
            (true, true) => OptMode::Transform(opt.name.trim().to_string()),
        }
    }
}

/// Named fields of a dubbo call that a rule may overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DubboField {
    Interface,
    Method,
    Group,
    Version,
    Application,
}

/// Parsed `MappingParam.mapTo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    /// Positional dubbo argument.
    Argument(usize),
    DubboField(DubboField),
    Header(String),
    Query(String),
    /// JSON body location; empty replaces the whole body.
    Body(Vec<String>),
    /// Variable of the backend path template.
    PathVariable(String),
    /// Free-form parameter of a protocol without native support.
    Named(String),
}

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub source: SourceRef,
    pub target: MappingTarget,
    pub opt: OptMode,
    /// The rule as written, for diagnostics.
    pub declared: MappingParam,
}

/// Integration request with its rules compiled against its backend.
#[derive(Debug, Clone)]
pub struct CompiledIntegration {
    pub backend: Backend,
    pub rules: Vec<MappingRule>,
    /// Parsed HTTP backend path; `None` forwards the inbound path.
    pub path_template: Option<Vec<Segment>>,
}

impl CompiledIntegration {
    /// Compile `request`; problems are reported into `errors`.
    pub fn compile(request: &IntegrationRequest, location: &str, errors: &mut ValidationErrors) -> Self {
        let path_template = match &request.backend {
            Backend::Http(config) if !config.path.trim().is_empty() => {
                match path::parse_template(&config.path) {
                    Ok(segments) => Some(segments),
                    Err(e) => {
                        errors.push(location, format!("http backend path: {}", e));
                        None
                    }
                }
            }
            _ => None,
        };
        let path_variables = path_template
            .as_deref()
            .map(path::capture_names)
            .unwrap_or_default();

        let mut rules = Vec::with_capacity(request.mapping_params.len());
        for declared in &request.mapping_params {
            let source = match SourceRef::parse(&declared.name) {
                Ok(source) => source,
                Err(e) => {
                    errors.push(location, format!("mapping name: {}", e));
                    continue;
                }
            };
            let target = match parse_target(&request.backend, &declared.map_to, &path_variables) {
                Ok(target) => target,
                Err(e) => {
                    errors.push(location, format!("mapping '{}': {}", declared.name, e));
                    continue;
                }
            };
            rules.push(MappingRule {
                source,
                target,
                opt: OptMode::from(&declared.opt),
                declared: declared.clone(),
            });
        }

        Self {
            backend: request.backend.clone(),
            rules,
            path_template,
        }
    }

    /// Option names that rules will look up at request time.
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| match &rule.opt {
            OptMode::Transform(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

fn parse_target(backend: &Backend, raw: &str, path_variables: &[String]) -> Result<MappingTarget, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("mapTo is empty".to_string());
    }
    match backend {
        Backend::Dubbo(config) => {
            if raw.bytes().all(|b| b.is_ascii_digit()) {
                // Arguments are positional, so paramTypes fixes the arity.
                if config.param_types.is_empty() {
                    return Err(format!("argument {} needs paramTypes to be declared", raw));
                }
                return match raw.parse::<usize>() {
                    Ok(index) if index < config.param_types.len() => Ok(MappingTarget::Argument(index)),
                    _ => Err(format!(
                        "argument {} is out of range for {} paramTypes",
                        raw,
                        config.param_types.len()
                    )),
                };
            }
            let field = match raw.to_ascii_lowercase().as_str() {
                "interface" => DubboField::Interface,
                "method" => DubboField::Method,
                "group" => DubboField::Group,
                "version" => DubboField::Version,
                "application" | "applicationname" => DubboField::Application,
                _ => return Err(format!("'{}' is not a dubbo argument index or field", raw)),
            };
            Ok(MappingTarget::DubboField(field))
        }
        Backend::Http(_) => {
            let (scope_text, field) = match raw.split_once('.') {
                Some((scope, field)) => (scope, field),
                None => (raw, ""),
            };
            match Scope::parse(scope_text) {
                Some(Scope::Header) if !field.is_empty() => Ok(MappingTarget::Header(field.to_string())),
                Some(Scope::Query) if !field.is_empty() => Ok(MappingTarget::Query(field.to_string())),
                Some(Scope::Body) if field.is_empty() => Ok(MappingTarget::Body(Vec::new())),
                Some(Scope::Body) => Ok(MappingTarget::Body(dotted(field, raw)?)),
                Some(Scope::Path) if path_variables.iter().any(|v| v == field) => {
                    Ok(MappingTarget::PathVariable(field.to_string()))
                }
                Some(Scope::Path) => Err(format!("backend path has no variable '{}'", field)),
                _ => Err(format!("'{}' is not an http request field", raw)),
            }
        }
        Backend::Unknown(_) => Ok(MappingTarget::Named(raw.to_string())),
    }
}

fn dotted(path: &str, raw: &str) -> Result<Vec<String>, String> {
    let parts: Vec<String> = path.split('.').map(str::to_string).collect();
    if parts.iter().any(String::is_empty) {
        return Err(format!("'{}' has an empty path element", raw));
    }
    Ok(parts)
}
