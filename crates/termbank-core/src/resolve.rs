//! Data source resolution: registry first, then the directory.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::datasource::DataSource;
use crate::directory::{Directory, DirectoryError, normalize_name};
use crate::registry::ResourceRegistry;
use crate::resource::{ResourceKind, SharedResource};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("data source '{name}' not found")]
    NotFound { name: String },

    #[error("no data source configured")]
    NotConfigured,

    #[error("directory lookup of '{name}' failed")]
    NamingProtocol {
        name: String,
        #[source]
        source: DirectoryError,
    },

    #[error("resource '{name}' is a {found} resource, not a data source")]
    KindMismatch { name: String, found: ResourceKind },
}

/// Resolves data source names against a registry and a directory.
#[derive(Clone)]
pub struct ResolutionChain {
    registry: Arc<ResourceRegistry>,
    directory: Arc<dyn Directory>,
}

impl ResolutionChain {
    pub fn new(registry: Arc<ResourceRegistry>, directory: Arc<dyn Directory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Resolve `name` in the registry, falling back to the directory under
    /// the normalized name.
    ///
    /// An unresolved name is `Ok(None)` when `ignore` is set and
    /// [`ResolveError::NotFound`] otherwise. Directory failures and kind
    /// mismatches are returned regardless of `ignore`.
    pub fn resolve(
        &self,
        name: &str,
        ignore: bool,
    ) -> Result<Option<Arc<dyn DataSource>>, ResolveError> {
        if let Some(resource) = self.registry.lookup(name) {
            info!(data_source = name, "Resolved data source from registry");
            return data_source(name, resource).map(Some);
        }
        self.resolve_in_directory(name, ignore)
    }

    /// Resolve `name` in the directory only.
    pub fn resolve_in_directory(
        &self,
        name: &str,
        ignore: bool,
    ) -> Result<Option<Arc<dyn DataSource>>, ResolveError> {
        let path = normalize_name(name);
        info!(path = %path, "Looking up data source in directory");
        match self.directory.lookup(&path) {
            Ok(resource) => data_source(&path, resource).map(Some),
            Err(DirectoryError::NotFound(_)) => not_found(name, ignore),
            Err(source) => {
                error!(path = %path, error = %source, "Directory lookup failed");
                Err(ResolveError::NamingProtocol {
                    name: path.into_owned(),
                    source,
                })
            }
        }
    }

    /// Resolve an optional name; no name at all is [`ResolveError::NotConfigured`]
    /// unless `ignore` is set.
    pub fn resolve_optional(
        &self,
        name: Option<&str>,
        ignore: bool,
    ) -> Result<Option<Arc<dyn DataSource>>, ResolveError> {
        match name {
            Some(name) => self.resolve(name, ignore),
            None if ignore => {
                warn!("No data source configured");
                Ok(None)
            }
            None => Err(ResolveError::NotConfigured),
        }
    }
}

fn data_source(name: &str, resource: SharedResource) -> Result<Arc<dyn DataSource>, ResolveError> {
    let found = resource.kind();
    resource.as_data_source().ok_or_else(|| {
        error!(resource = name, found = %found, "Resource is not a data source");
        ResolveError::KindMismatch {
            name: name.to_string(),
            found,
        }
    })
}

fn not_found(name: &str, ignore: bool) -> Result<Option<Arc<dyn DataSource>>, ResolveError> {
    if ignore {
        warn!(data_source = name, "Data source not found, continuing without it");
        Ok(None)
    } else {
        error!(data_source = name, "Data source not found");
        Err(ResolveError::NotFound {
            name: name.to_string(),
        })
    }
}
