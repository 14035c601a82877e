//! Gateway process settings.
//!
//! Everything that is not part of the route tree itself: where to listen,
//! where the API config lives, default timeouts, retry and observability
//! knobs. Loaded from TOML; every section has defaults so an empty file is
//! a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewaySettings {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Location of the API configuration and reload behaviour.
    pub api: ApiSourceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for the HTTP dispatcher.
    pub retries: RetryConfig,

    /// Route compilation switches.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Maximum accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Where the API configuration is read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiSourceConfig {
    /// Path to the API config (`.yaml`, `.yml`, `.json` or `.toml`).
    pub config_path: PathBuf,

    /// Reload the API config when the file changes.
    pub watch: bool,
}

impl Default for ApiSourceConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("api_config.yaml"),
            watch: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Used when neither the method nor any enclosing resource sets one.
    #[serde(with = "humantime_serde")]
    pub default_request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_request: Duration::from_secs(30),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries in the HTTP dispatcher.
    pub enabled: bool,

    /// Maximum number of attempts, first try included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Route compilation switches.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Accept resources with identical effective paths; the first declared
    /// one wins and the rest are logged and ignored.
    pub allow_duplicate_paths: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
