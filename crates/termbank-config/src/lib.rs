#![deny(unsafe_code)]

//! Configuration loading and validation for termbank.
//!
//! Loads TOML configuration files into [`AppConfig`], the central
//! configuration structure. Resource definitions live under
//! `[resources.<name>]` and keep their document order; query readers live
//! under `[readers.<name>]`.

/// Declarative resource definitions and property values.
pub mod definition;

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use definition::{CLASS_KEY, IGNORE_ERRORS_KEY, PropertyValue, ResourceDefinition};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shared resources by name, in declaration order.
    #[serde(default)]
    pub resources: IndexMap<String, ResourceDefinition>,

    /// Query readers by name, in declaration order.
    #[serde(default)]
    pub readers: IndexMap<String, ReaderConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A query reader: SQL run against a named data source, exposed as a
/// virtual resource.
///
/// ## TOML Example
///
/// ```toml
/// [readers.stopwords]
/// data_source = "synonyms_db"
/// sql = "SELECT word FROM stopwords ORDER BY word"
/// ignore_missing_database = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Name of the data source, looked up in the registry and then the
    /// directory.
    #[serde(default)]
    pub data_source: Option<String>,

    /// Directory name of the data source; resolved in the directory only.
    #[serde(default)]
    pub directory_name: Option<String>,

    /// SQL whose first column yields one line per row.
    pub sql: String,

    /// Tolerate a missing data source. When unset the default of the
    /// lookup flavour applies (registry: true, directory-only: false).
    #[serde(default)]
    pub ignore_missing_database: Option<bool>,
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), bytes = content.len(), "Read config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, definition) in &self.resources {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "resource names must not be empty".to_string(),
                ));
            }
            match definition.class() {
                Some(PropertyValue::String(class)) if !class.is_empty() => {}
                Some(other) => {
                    return Err(ConfigError::Validation(format!(
                        "resources.{name}.{CLASS_KEY} must be a non-empty string, got {other:?}"
                    )));
                }
                None => {
                    return Err(ConfigError::Validation(format!(
                        "resources.{name}.{CLASS_KEY} is required"
                    )));
                }
            }
            if let Some(flag) = definition.get(IGNORE_ERRORS_KEY) {
                if flag.as_bool().is_none() {
                    return Err(ConfigError::Validation(format!(
                        "resources.{name}.{IGNORE_ERRORS_KEY} must be true or false, got {flag}"
                    )));
                }
            }
        }

        for (name, reader) in &self.readers {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "reader names must not be empty".to_string(),
                ));
            }
            if reader.sql.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "readers.{name}.sql must not be empty"
                )));
            }
            if reader.data_source.is_some() && reader.directory_name.is_some() {
                return Err(ConfigError::Validation(format!(
                    "readers.{name}: set either data_source or directory_name, not both"
                )));
            }
            if let Some(source) = &reader.data_source {
                if source.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "readers.{name}.data_source must not be empty"
                    )));
                }
            }
            if let Some(directory_name) = &reader.directory_name {
                if directory_name.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "readers.{name}.directory_name must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }
}
