//! API gateway: route resolution and parameter mapping core.

pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod http;
pub mod integration;
pub mod lifecycle;
pub mod mapping;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::schema::APIConfig;
pub use error::{ErrorKind, GatewayError};
pub use gateway::{Components, Gateway, Generation};
pub use http::{HttpServer, RawRequest};
pub use integration::{GatewayResponse, IntegrationDispatcher};
pub use lifecycle::Shutdown;
pub use mapping::IntegrationCall;
