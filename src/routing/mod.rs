//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (verb, path)
//!     → path.rs (split into segments)
//!     → trie.rs (literal > variable > wildcard, with backtracking)
//!     → index.rs (verb dispatch: exact, then ANY)
//!     → Return: MatchedMethod, RouteNotFound or MethodNotAllowed
//!
//! Route Compilation (per config generation):
//!     APIConfig resource tree
//!     → Flatten to effective path templates
//!     → Compile methods and mapping rules
//!     → Freeze as immutable RouteIndex
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per generation, immutable at runtime
//! - No regex in hot path (segment trie only)
//! - Deterministic: same input always matches same route
//! - Lookup cost depends on path depth, not route count

pub mod index;
pub mod path;
pub(crate) mod trie;

pub use index::{CompileOptions, CompiledMethod, CompiledRoute, MatchedMethod, RouteIndex, RouteSummary};
