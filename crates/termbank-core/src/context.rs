//! Host entry point.
//!
//! [`ResourceContext`] owns one registry, the builder's factory table, and
//! the directory, and hands out the resolution chain over them. A host
//! typically creates one context at startup from its [`AppConfig`] and keeps
//! it for the lifetime of the process.

use std::sync::Arc;

use indexmap::IndexMap;
use termbank_config::{AppConfig, ReaderConfig, ResourceDefinition};
use tracing::{info, warn};

use crate::builder::{BuildError, DATA_SOURCE_KEY, DataSourceArgs, ResourceBuilder};
use crate::directory::{Directory, MemoryDirectory};
use crate::reader::{QueryDefinition, QueryReader, ReaderError};
use crate::registry::ResourceRegistry;
use crate::resolve::ResolutionChain;
use crate::resource::SharedResource;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("resource names must not be empty")]
    EmptyName,
}

pub struct ResourceContext {
    registry: Arc<ResourceRegistry>,
    builder: ResourceBuilder,
    directory: Arc<dyn Directory>,
    chain: ResolutionChain,
}

impl ResourceContext {
    pub fn new(builder: ResourceBuilder, directory: Arc<dyn Directory>) -> Self {
        let registry = Arc::new(ResourceRegistry::new());
        let chain = ResolutionChain::new(Arc::clone(&registry), Arc::clone(&directory));
        Self {
            registry,
            builder,
            directory,
            chain,
        }
    }

    /// Context with the built-in classes and an empty in-memory directory.
    pub fn with_builtins() -> Self {
        Self::new(
            ResourceBuilder::with_builtins(),
            Arc::new(MemoryDirectory::new()),
        )
    }

    /// Context with the built-in classes and every resource of `config`
    /// registered.
    pub fn from_config(config: &AppConfig) -> Result<Self, ContextError> {
        let context = Self::with_builtins();
        context.define_all(config)?;
        Ok(context)
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn builder(&self) -> &ResourceBuilder {
        &self.builder
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn chain(&self) -> &ResolutionChain {
        &self.chain
    }

    /// Register `name` from `definition` unless it is already registered.
    ///
    /// `Ok(None)` means the resource is unavailable: its build failed with
    /// `ignoreErrors` on, or a concurrent attempt failed.
    pub fn define(
        &self,
        name: &str,
        definition: ResourceDefinition,
    ) -> Result<Option<SharedResource>, ContextError> {
        if name.is_empty() {
            return Err(ContextError::EmptyName);
        }
        let resource = self
            .registry
            .get_or_create(name, || self.builder.build(name, definition))?;
        match &resource {
            Some(_) => info!(resource = name, "Resource available"),
            None => warn!(resource = name, "Resource unavailable"),
        }
        Ok(resource)
    }

    /// Register every resource of `config` in declaration order. Returns the
    /// names that ended up available.
    pub fn define_all(&self, config: &AppConfig) -> Result<Vec<String>, ContextError> {
        let mut available = Vec::new();
        for (name, definition) in &config.resources {
            if self.define(name, definition.clone())?.is_some() {
                available.push(name.clone());
            }
        }
        Ok(available)
    }

    /// Register a data source declared through `pool`-prefixed arguments.
    /// The consumed keys are removed from `args`.
    pub fn register_data_source(
        &self,
        args: &mut IndexMap<String, String>,
    ) -> Result<Option<SharedResource>, ContextError> {
        let DataSourceArgs { name, definition } = DataSourceArgs::take_from(args);
        let name = name.ok_or(ContextError::MissingParameter(DATA_SOURCE_KEY))?;
        info!(data_source = %name, "Registering data source");
        self.define(&name, definition)
    }

    /// Build a reader from its configuration.
    ///
    /// Without an explicit `ignore_missing_database`, directory-resolved
    /// readers are strict and registry-resolved readers are tolerant.
    pub fn reader(&self, config: &ReaderConfig) -> Result<QueryReader, ReaderError> {
        let ignore = config
            .ignore_missing_database
            .unwrap_or(config.directory_name.is_none());
        let definition = QueryDefinition {
            sql: config.sql.clone(),
            data_source_name: config.data_source.clone(),
            directory_name: config.directory_name.clone(),
            ignore_missing_database: ignore,
        };
        QueryReader::open(definition, &self.chain)
    }

    /// Drop every registered resource.
    pub fn clear(&self) {
        self.registry.clear();
    }
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self::with_builtins()
    }
}
