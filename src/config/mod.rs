//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewaySettings (validated, immutable)
//!
//! API config file (YAML/JSON/TOML)
//!     → loader.rs (format by extension)
//!     → validation.rs (model checks)
//!     → APIConfig → compiled into a gateway Generation
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads new API config
//!     → gateway builds and validates a new Generation
//!     → atomic swap; in-flight requests keep the old one
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;
pub mod watcher;

pub use loader::{load_api_config, load_settings, ConfigError, ConfigFormat};
pub use schema::APIConfig;
pub use settings::GatewaySettings;
