//! External naming/directory service.
//!
//! The directory is the second stage of data source resolution. Names are
//! path-like strings; bare names live under the component environment scope
//! [`DIRECTORY_SCOPE`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::resource::SharedResource;

/// Scope prefix under which bare names are looked up.
pub const DIRECTORY_SCOPE: &str = "comp/env/";

/// Prefix `name` with [`DIRECTORY_SCOPE`] unless it already carries it.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    if name.starts_with(DIRECTORY_SCOPE) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{DIRECTORY_SCOPE}{name}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Nothing is bound at the path.
    #[error("no binding for '{0}'")]
    NotFound(String),

    /// The directory itself failed.
    #[error("directory failure: {0}")]
    Protocol(String),
}

/// A directory of bound resources.
pub trait Directory: Send + Sync {
    /// Look up the object bound at `path`.
    fn lookup(&self, path: &str) -> Result<SharedResource, DirectoryError>;
}

/// In-process directory.
///
/// Bindings are exact paths: bind `comp/env/ds1` for the bare name `ds1` to
/// resolve. A fault can be injected so every lookup reports a protocol error.
#[derive(Default)]
pub struct MemoryDirectory {
    bindings: RwLock<HashMap<String, SharedResource>>,
    fault: RwLock<Option<String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `resource` at `path`, replacing any previous binding.
    pub fn bind(&self, path: impl Into<String>, resource: SharedResource) {
        let path = path.into();
        debug!(path = %path, "Bound directory entry");
        self.bindings.write().insert(path, resource);
    }

    /// Remove the binding at `path`, returning it.
    pub fn unbind(&self, path: &str) -> Option<SharedResource> {
        self.bindings.write().remove(path)
    }

    /// Make every subsequent lookup fail with a protocol error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fault.write() = Some(message.into());
    }

    /// Undo [`fail_with`](Self::fail_with).
    pub fn heal(&self) {
        *self.fault.write() = None;
    }
}

impl Directory for MemoryDirectory {
    fn lookup(&self, path: &str) -> Result<SharedResource, DirectoryError> {
        if let Some(message) = self.fault.read().as_ref() {
            return Err(DirectoryError::Protocol(message.clone()));
        }
        self.bindings
            .read()
            .get(path)
            .map(Arc::clone)
            .ok_or_else(|| DirectoryError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    #[derive(Debug)]
    struct Entry;

    impl Resource for Entry {}

    #[test]
    fn test_normalize_name_adds_scope_once() {
        assert_eq!(normalize_name("ds1"), "comp/env/ds1");
        assert_eq!(normalize_name("comp/env/ds1"), "comp/env/ds1");
        assert!(matches!(normalize_name("comp/env/x"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_bind_lookup_unbind() {
        let directory = MemoryDirectory::new();
        directory.bind("comp/env/ds1", Arc::new(Entry));
        assert!(directory.lookup("comp/env/ds1").is_ok());
        assert_eq!(
            directory.lookup("ds1").unwrap_err(),
            DirectoryError::NotFound("ds1".to_string())
        );
        assert!(directory.unbind("comp/env/ds1").is_some());
        assert!(directory.lookup("comp/env/ds1").is_err());
    }

    #[test]
    fn test_fault_injection() {
        let directory = MemoryDirectory::new();
        directory.bind("comp/env/ds1", Arc::new(Entry));
        directory.fail_with("server unreachable");
        assert_eq!(
            directory.lookup("comp/env/ds1").unwrap_err(),
            DirectoryError::Protocol("server unreachable".to_string())
        );
        directory.heal();
        assert!(directory.lookup("comp/env/ds1").is_ok());
    }
}
