//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::APIConfig;
use crate::config::settings::GatewaySettings;
use crate::config::validation::{validate_api_config, validate_settings, ValidationError, ValidationErrors};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(ValidationErrors(errors))
    }
}

/// Serialization format of an API config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Load and validate process settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<GatewaySettings, ConfigError> {
    let content = read(path)?;
    let settings: GatewaySettings = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    validate_settings(&settings)?;

    Ok(settings)
}

/// Load an API config; the format follows the file extension.
pub fn load_api_config(path: &Path) -> Result<APIConfig, ConfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = read(path)?;
    parse_api_config(&content, format).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Parse and validate an API config from text.
pub fn parse_api_config(content: &str, format: ConfigFormat) -> Result<APIConfig, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: PathBuf::new(),
        message,
    };
    let config: APIConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
    };

    let mut errors = ValidationErrors::default();
    validate_api_config(&config, &mut errors);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    tracing::debug!(
        name = %config.name,
        resources = config.resources.len(),
        definitions = config.definitions.len(),
        "API config parsed"
    );
    Ok(config)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
