//! Named resource registry.
//!
//! Maps resource names to constructed objects and guarantees that at most one
//! construction per name is in flight at any time. Concurrent callers for a
//! name that is being built block until the builder finishes and then observe
//! its outcome. Failed or unavailable constructions are not cached: the next
//! call for that name builds again.
//!
//! The registry is an ordinary value. Hosts create one, share it behind an
//! `Arc`, and inject it into collaborators; there is no process-wide
//! instance.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::resource::{Resource, ResourceKind, SharedResource};

/// Errors from typed registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("resource '{name}' is a {found} resource, not a {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: ResourceKind,
    },
}

/// Why a construction left nothing behind. Shared with waiting callers.
#[derive(Debug)]
enum Unavailable {
    Empty,
    Failed,
}

/// Registry of shared resources by name.
pub struct ResourceRegistry {
    resources: Cache<String, SharedResource>,
    /// Thread currently running the constructor of each name.
    builders: Mutex<HashMap<String, ThreadId>>,
    /// Bumped by [`clear`](Self::clear).
    epoch: AtomicU64,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            resources: Cache::builder().build(),
            builders: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Return the resource registered under `name`, constructing it with
    /// `ctor` if absent.
    ///
    /// `ctor` runs on the calling thread, and constructions of different
    /// names proceed in parallel. While it runs, other callers for the same
    /// name block and then observe its result: the constructed resource, or
    /// `Ok(None)` when construction yielded nothing or failed. Only the
    /// thread that ran `ctor` sees its error.
    ///
    /// A `ctor` that asks for its own name again gets `Ok(None)` instead of
    /// deadlocking.
    pub fn get_or_create<F, E>(&self, name: &str, ctor: F) -> Result<Option<SharedResource>, E>
    where
        F: FnOnce() -> Result<Option<SharedResource>, E>,
    {
        if let Some(resource) = self.resources.get(name) {
            return Ok(Some(resource));
        }
        if self.builders.lock().get(name) == Some(&thread::current().id()) {
            error!(resource = name, "Resource requested during its own construction");
            return Ok(None);
        }

        let mut failure = None;
        let mut started = None;
        let outcome = self.resources.try_get_with(name.to_string(), || {
            let _builder = BuilderMark::enter(&self.builders, name);
            started = Some(self.epoch.load(Ordering::SeqCst));
            match ctor() {
                Ok(Some(resource)) => Ok(resource),
                Ok(None) => Err(Unavailable::Empty),
                Err(err) => {
                    failure = Some(err);
                    Err(Unavailable::Failed)
                }
            }
        });

        match outcome {
            Ok(resource) => {
                if let Some(epoch) = started {
                    if epoch == self.epoch.load(Ordering::SeqCst) {
                        info!(resource = name, "Registered resource");
                    } else {
                        self.resources.invalidate(name);
                        debug!(resource = name, "Registry cleared during construction");
                    }
                }
                Ok(Some(resource))
            }
            Err(reason) => match failure {
                Some(err) => Err(err),
                None => {
                    debug!(resource = name, reason = ?reason, "No resource registered");
                    Ok(None)
                }
            },
        }
    }

    /// Look up a resource without constructing it.
    pub fn lookup(&self, name: &str) -> Option<SharedResource> {
        self.resources.get(name)
    }

    /// Look up a resource expected to be of `kind`.
    ///
    /// A mismatch is logged but the resource is still returned; callers must
    /// check the capability they need themselves.
    pub fn lookup_kind(&self, name: &str, kind: ResourceKind) -> Option<SharedResource> {
        let Some(resource) = self.lookup(name) else {
            info!(resource = name, "Resource not found");
            return None;
        };
        if resource.kind() != kind {
            error!(
                resource = name,
                expected = %kind,
                found = %resource.kind(),
                "Resource is not of the expected kind"
            );
        }
        Some(resource)
    }

    /// Look up a resource as a concrete type.
    pub fn lookup_as<T: Resource + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<T>>, RegistryError> {
        let Some(resource) = self.lookup(name) else {
            return Ok(None);
        };
        let found = resource.kind();
        resource
            .into_any_arc()
            .downcast::<T>()
            .map(Some)
            .map_err(|_| RegistryError::KindMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                found,
            })
    }

    /// Whether a constructed resource is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Names of all constructed resources, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .resources
            .iter()
            .map(|(name, _)| name.as_ref().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of constructed resources.
    pub fn len(&self) -> usize {
        self.resources.iter().count()
    }

    /// Whether no resource has been constructed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    ///
    /// Destructive: meant for tests and full resets. Holders of previously
    /// returned resources keep them. A construction in flight finishes for
    /// its own caller and waiters, but its result is not kept.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let names: Vec<Arc<String>> = self.resources.iter().map(|(name, _)| name).collect();
        for name in &names {
            self.resources.invalidate(name.as_str());
        }
        warn!(removed = names.len(), "Cleared resource registry");
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the constructing thread of a name until dropped, panics included.
struct BuilderMark<'a> {
    builders: &'a Mutex<HashMap<String, ThreadId>>,
    name: &'a str,
}

impl<'a> BuilderMark<'a> {
    fn enter(builders: &'a Mutex<HashMap<String, ThreadId>>, name: &'a str) -> Self {
        builders
            .lock()
            .insert(name.to_string(), thread::current().id());
        Self { builders, name }
    }
}

impl Drop for BuilderMark<'_> {
    fn drop(&mut self) {
        self.builders.lock().remove(self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Pool(&'static str);

    impl Resource for Pool {}

    #[derive(Debug)]
    struct Other;

    impl Resource for Other {}

    fn pool(label: &'static str) -> Result<Option<SharedResource>, String> {
        Ok(Some(Arc::new(Pool(label))))
    }

    #[test]
    fn test_get_or_create_constructs_once() {
        let registry = ResourceRegistry::new();
        let first = registry.get_or_create("ds1", || pool("a")).unwrap().unwrap();
        let second = registry
            .get_or_create("ds1", || -> Result<_, String> { panic!("must not rebuild") })
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_never_constructs() {
        let registry = ResourceRegistry::new();
        assert!(registry.lookup("missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_none_result_is_not_cached() {
        let registry = ResourceRegistry::new();
        let calls = AtomicUsize::new(0);

        let result = registry
            .get_or_create("ds1", || -> Result<_, String> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .unwrap();
        assert!(result.is_none());
        assert!(!registry.contains("ds1"));

        registry.get_or_create("ds1", || pool("b")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.contains("ds1"));
    }

    #[test]
    fn test_error_propagates_and_allows_retry() {
        let registry = ResourceRegistry::new();
        let err = registry
            .get_or_create("ds1", || Err::<Option<SharedResource>, _>("boom".to_string()))
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(registry.lookup("ds1").is_none());

        assert!(registry.get_or_create("ds1", || pool("c")).unwrap().is_some());
    }

    #[test]
    fn test_clear_then_recreate() {
        let registry = ResourceRegistry::new();
        let calls = AtomicUsize::new(0);
        let ctor = || {
            calls.fetch_add(1, Ordering::SeqCst);
            pool("d")
        };

        registry.get_or_create("ds1", ctor).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        registry.get_or_create("ds1", ctor).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_callers_share_one_construction() {
        const THREADS: usize = 16;
        let registry = ResourceRegistry::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let results: Vec<SharedResource> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry
                            .get_or_create("shared", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                pool("shared")
                            })
                            .unwrap()
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_waiters_observe_failure_as_absent() {
        let registry = ResourceRegistry::new();
        let started = Barrier::new(2);

        thread::scope(|scope| {
            let builder = scope.spawn(|| {
                registry.get_or_create("flaky", || {
                    started.wait();
                    thread::sleep(Duration::from_millis(100));
                    Err::<Option<SharedResource>, _>("down".to_string())
                })
            });
            started.wait();
            let waiter = scope.spawn(|| {
                registry.get_or_create("flaky", || -> Result<_, String> {
                    panic!("waiter must not build while the first attempt is in flight")
                })
            });

            assert!(builder.join().unwrap().is_err());
            assert!(waiter.join().unwrap().unwrap().is_none());
        });
    }

    #[test]
    fn test_panicking_constructor_releases_slot() {
        let registry = ResourceRegistry::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = registry.get_or_create("fragile", || -> Result<_, String> { panic!("ctor") });
        }));
        assert!(outcome.is_err());
        assert!(registry.get_or_create("fragile", || pool("e")).unwrap().is_some());
    }

    #[test]
    fn test_self_request_during_construction_yields_none() {
        let registry = ResourceRegistry::new();
        let inner = registry
            .get_or_create("loop", || {
                let nested = registry.get_or_create("loop", || pool("never"))?;
                assert!(nested.is_none());
                pool("outer")
            })
            .unwrap();
        assert!(inner.is_some());
    }

    #[test]
    fn test_clear_during_construction_discards_result() {
        let registry = ResourceRegistry::new();
        let result = registry
            .get_or_create("late", || {
                registry.clear();
                pool("late")
            })
            .unwrap();
        assert!(result.is_some());
        assert!(!registry.contains("late"));
    }

    #[test]
    fn test_lookup_as_and_kind() {
        let registry = ResourceRegistry::new();
        registry.get_or_create("p", || pool("p")).unwrap();

        let typed = registry.lookup_as::<Pool>("p").unwrap().unwrap();
        assert_eq!(typed.0, "p");
        assert!(matches!(
            registry.lookup_as::<Other>("p"),
            Err(RegistryError::KindMismatch { .. })
        ));
        assert!(registry.lookup_as::<Pool>("absent").unwrap().is_none());

        // Lenient lookup returns the resource despite the mismatch.
        assert!(registry.lookup_kind("p", ResourceKind::DataSource).is_some());
    }

    #[test]
    fn test_names_sorted() {
        let registry = ResourceRegistry::new();
        registry.get_or_create("b", || pool("b")).unwrap();
        registry.get_or_create("a", || pool("a")).unwrap();
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
