//! The resource capability stored by the registry.
//!
//! The registry treats resources as opaque beyond their identity. What a
//! consumer may do with one is discovered through explicit capability checks
//! ([`Resource::kind`], [`Resource::as_data_source`]) instead of downcasting
//! at every call site.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::datasource::DataSource;

/// A shared, reference-counted resource.
pub type SharedResource = Arc<dyn Resource>;

/// Coarse capability tag of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Can run queries; see [`DataSource`].
    DataSource,
    /// Anything else.
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::DataSource => write!(f, "data source"),
            ResourceKind::Other => write!(f, "other"),
        }
    }
}

/// Upcast helper implemented for every sized `Send + Sync` type.
pub trait AsAnyArc {
    /// Convert into an `Any` handle for typed downcasting.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A named, shared, expensively-constructed object.
///
/// Implementations must be internally thread-safe: the registry hands out
/// the same instance to every caller without further synchronisation.
pub trait Resource: AsAnyArc + Send + Sync + fmt::Debug {
    /// Capability tag used for kind checks at lookup boundaries.
    fn kind(&self) -> ResourceKind {
        ResourceKind::Other
    }

    /// View this resource as a data source, if it is one.
    fn as_data_source(self: Arc<Self>) -> Option<Arc<dyn DataSource>> {
        None
    }
}

/// Address of an object, for identity-keyed visited sets.
pub(crate) fn identity<T: ?Sized>(value: &T) -> usize {
    value as *const T as *const () as usize
}
