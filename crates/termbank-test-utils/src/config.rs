//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use termbank_config::{AppConfig, ReaderConfig, ResourceDefinition};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .sqlite_resource("words", fixture.path())
///     .reader("stop", "words", "SELECT word FROM stopwords")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn resource(mut self, name: &str, definition: ResourceDefinition) -> Self {
        self.config.resources.insert(name.to_string(), definition);
        self
    }

    /// A strict `sqlite` resource over the database at `path`.
    pub fn sqlite_resource(self, name: &str, path: &Path) -> Self {
        let definition = ResourceDefinition::with_class("sqlite")
            .with("path", path.to_string_lossy().into_owned())
            .with("ignoreErrors", false);
        self.resource(name, definition)
    }

    /// A registry-resolved reader.
    pub fn reader(mut self, name: &str, data_source: &str, sql: &str) -> Self {
        self.config.readers.insert(
            name.to_string(),
            ReaderConfig {
                data_source: Some(data_source.to_string()),
                directory_name: None,
                sql: sql.to_string(),
                ignore_missing_database: None,
            },
        );
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
