//! Resource context helpers.
//!
//! Helpers for constructing [`ResourceContext`] instances in tests from TOML
//! written to a temporary config file.

use std::path::PathBuf;

use tempfile::TempDir;
use termbank_config::AppConfig;
use termbank_core::ResourceContext;

/// A test-scoped context with an owned temp directory for its config file.
///
/// The temp directory is deleted automatically when this value is dropped.
pub struct TestContext {
    pub context: ResourceContext,
    pub config: AppConfig,
    pub config_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Write `toml_content` to a temporary config file, load it, and register
    /// its resources.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("termbank.toml");
        tokio::fs::write(&config_path, toml_content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&config_path)
            .await
            .expect("failed to parse test config");
        let context = ResourceContext::from_config(&config).expect("failed to build context");

        Self {
            context,
            config,
            config_path,
            _temp_dir: temp_dir,
        }
    }

    /// A context over an empty config.
    pub async fn empty() -> Self {
        Self::with_toml("").await
    }
}
