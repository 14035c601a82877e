//! Parameter mapping subsystem.
//!
//! # Data Flow
//! ```text
//! Route compilation:
//!     MappingParam[] → rules.rs (typed sources, targets, Opt modes)
//!
//! Per request:
//!     MatchedMethod + RawRequest
//!     → extract.rs (preconditions, typed header/query/path values)
//!     → validator.rs (body against named definitions)
//!     → resolver.rs (apply rules, options.rs transforms)
//!     → call.rs IntegrationCall
//! ```
//!
//! # Design Decisions
//! - Rule strings are parsed once per generation, never per request
//! - Option behaviours and schema validation are pluggable collaborators

pub mod call;
pub mod extract;
pub mod options;
pub mod resolver;
pub mod rules;
pub mod validator;

pub use call::{CallTarget, DubboCall, GenericCall, HttpCall, IntegrationCall};
pub use options::{OptionBehavior, OptionRegistry};
pub use resolver::ParameterResolver;
pub use validator::{JsonSchemaValidator, SchemaValidator};
