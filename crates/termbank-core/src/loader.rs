//! Resource loaders.
//!
//! Consumers read their word lists and similar data as named resources from
//! a [`ResourceLoader`]. [`VirtualResourceLoader`] answers the reserved name
//! [`VIRTUAL_RESOURCE`] from query results and delegates everything else to
//! its parent.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::reader::{ReaderError, RowReader};

/// Reserved resource name answered by query results.
pub const VIRTUAL_RESOURCE: &str = "database";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("invalid resource name '{0}'")]
    InvalidName(String),

    #[error("failed to open resource '{name}'")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Reader(#[from] ReaderError),
}

/// Opens named resources as byte streams.
pub trait ResourceLoader: Send + Sync {
    fn open_resource(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError>;
}

/// Files below a root directory.
#[derive(Debug, Clone)]
pub struct FsResourceLoader {
    root: PathBuf,
}

impl FsResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `name` to a path that stays below the root after following
    /// symlinks.
    fn resolve(&self, name: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(name);
        let escapes = name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(LoadError::InvalidName(name.to_string()));
        }
        let root = self.root.canonicalize().map_err(|e| open_error(name, e))?;
        let path = root
            .join(relative)
            .canonicalize()
            .map_err(|e| open_error(name, e))?;
        if !path.starts_with(&root) {
            warn!(resource = name, path = %path.display(), "Resource escapes loader root");
            return Err(LoadError::InvalidName(name.to_string()));
        }
        Ok(path)
    }
}

fn open_error(name: &str, err: io::Error) -> LoadError {
    if err.kind() == io::ErrorKind::NotFound {
        LoadError::NotFound(name.to_string())
    } else {
        LoadError::Io {
            name: name.to_string(),
            source: err,
        }
    }
}

impl ResourceLoader for FsResourceLoader {
    fn open_resource(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        let path = self.resolve(name)?;
        debug!(path = %path.display(), "Opening file resource");
        let file = File::open(&path).map_err(|e| open_error(name, e))?;
        Ok(Box::new(file))
    }
}

/// Loader that serves [`VIRTUAL_RESOURCE`] from a reader.
pub struct VirtualResourceLoader {
    parent: Arc<dyn ResourceLoader>,
    reader: Arc<dyn RowReader>,
}

impl VirtualResourceLoader {
    pub fn new(parent: Arc<dyn ResourceLoader>, reader: Arc<dyn RowReader>) -> Self {
        Self { parent, reader }
    }
}

impl ResourceLoader for VirtualResourceLoader {
    fn open_resource(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        if name == VIRTUAL_RESOURCE {
            debug!(sql = self.reader.sql(), "Serving virtual resource");
            return Ok(self.reader.reader()?);
        }
        self.parent.open_resource(name)
    }
}
