//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit)
//!     → request.rs (RawRequest: verb, path, headers, query, body)
//!     → gateway core (route, map, dispatch)
//!     → GatewayResponse or GatewayError → client
//! ```

pub mod request;
pub mod server;

pub use request::{RawRequest, X_REQUEST_ID};
pub use server::HttpServer;
