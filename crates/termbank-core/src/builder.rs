//! Declarative resource builder.
//!
//! A [`ResourceDefinition`] names a class and an ordered list of properties.
//! The builder looks the class up in its [`FactoryTable`], instantiates it,
//! and assigns each property in declaration order through the
//! [`Configurable`] table generated by `#[derive(Configurable)]`.
//!
//! The reserved `ignoreErrors` key (default true) decides whether a failure
//! is logged and turned into "no resource" or returned to the caller.
//! Property assignment is not transactional: a failure midway leaves the
//! half-configured object to be dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use termbank_config::{CLASS_KEY, IGNORE_ERRORS_KEY, PropertyValue, ResourceDefinition};
use tracing::{debug, error};

use crate::datasource::SqliteDataSource;
use crate::property::{Configurable, PropertyError};
use crate::resource::{Resource, SharedResource};

/// Errors raised while building a resource.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cannot instantiate resource '{resource}' of class '{class}': {reason}")]
    Instantiation {
        resource: String,
        class: String,
        reason: String,
    },

    #[error("cannot configure property '{property}' of resource '{resource}' ({class}): {source}")]
    Configuration {
        resource: String,
        class: String,
        property: String,
        #[source]
        source: PropertyError,
    },
}

/// A freshly instantiated object awaiting configuration.
pub trait Bindable: Configurable + Send {
    /// Finish configuration and share the object.
    fn into_resource(self: Box<Self>) -> SharedResource;
}

impl<T: Configurable + Resource + 'static> Bindable for T {
    fn into_resource(self: Box<Self>) -> SharedResource {
        Arc::new(*self)
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Bindable>, String> + Send + Sync>;

/// Classes the builder can instantiate, keyed by symbolic identifier.
#[derive(Default)]
pub struct FactoryTable {
    factories: BTreeMap<String, Factory>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in classes: `sqlite`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register::<SqliteDataSource>("sqlite");
        table
    }

    /// Register a default-constructible class.
    pub fn register<T>(&mut self, class: impl Into<String>)
    where
        T: Default + Configurable + Resource + 'static,
    {
        self.register_with(class, || Ok(T::default()));
    }

    /// Register a class whose constructor may refuse.
    pub fn register_with<T, F>(&mut self, class: impl Into<String>, ctor: F)
    where
        T: Configurable + Resource + 'static,
        F: Fn() -> Result<T, String> + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move || ctor().map(|t| Box::new(t) as Box<dyn Bindable>));
        self.factories.insert(class.into(), factory);
    }

    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Registered identifiers, sorted.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    fn instantiate(&self, class: &str) -> Result<Box<dyn Bindable>, String> {
        match self.factories.get(class) {
            Some(factory) => factory(),
            None => Err("unknown class".to_string()),
        }
    }
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// Turns definitions into configured resources.
#[derive(Debug, Default)]
pub struct ResourceBuilder {
    factories: FactoryTable,
}

impl ResourceBuilder {
    pub fn new(factories: FactoryTable) -> Self {
        Self { factories }
    }

    pub fn with_builtins() -> Self {
        Self::new(FactoryTable::with_builtins())
    }

    pub fn factories(&self) -> &FactoryTable {
        &self.factories
    }

    pub fn factories_mut(&mut self) -> &mut FactoryTable {
        &mut self.factories
    }

    /// Build the resource `name` from `definition`.
    ///
    /// Returns `Ok(None)` when building failed and the definition's
    /// `ignoreErrors` flag is on; the failure is logged.
    pub fn build(
        &self,
        name: &str,
        mut definition: ResourceDefinition,
    ) -> Result<Option<SharedResource>, BuildError> {
        let ignore = definition.take_ignore_errors();
        match self.try_build(name, definition) {
            Ok(resource) => Ok(Some(resource)),
            Err(err) if ignore => {
                log_failure(&err);
                Ok(None)
            }
            Err(err) => {
                log_failure(&err);
                Err(err)
            }
        }
    }

    fn try_build(
        &self,
        name: &str,
        mut definition: ResourceDefinition,
    ) -> Result<SharedResource, BuildError> {
        let class = match definition.take_class() {
            Some(class) => class.as_text().into_owned(),
            None => {
                return Err(BuildError::Instantiation {
                    resource: name.to_string(),
                    class: String::new(),
                    reason: format!("missing '{CLASS_KEY}' key"),
                });
            }
        };

        let mut object =
            self.factories
                .instantiate(&class)
                .map_err(|reason| BuildError::Instantiation {
                    resource: name.to_string(),
                    class: class.clone(),
                    reason,
                })?;

        for (property, value) in definition.into_properties() {
            object
                .set_property(&property, &value)
                .map_err(|source| BuildError::Configuration {
                    resource: name.to_string(),
                    class: class.clone(),
                    property: property.clone(),
                    source,
                })?;
            debug!(resource = name, property = %property, "Applied property");
        }

        Ok(object.into_resource())
    }
}

fn log_failure(err: &BuildError) {
    match err {
        BuildError::Instantiation {
            resource,
            class,
            reason,
        } => error!(
            resource = %resource,
            class = %class,
            reason = %reason,
            "Failed to instantiate resource"
        ),
        BuildError::Configuration {
            resource,
            class,
            property,
            source,
        } => error!(
            resource = %resource,
            class = %class,
            property = %property,
            error = %source,
            "Failed to configure resource"
        ),
    }
}

/// Key naming the data source in prefixed arguments.
pub const DATA_SOURCE_KEY: &str = "dataSource";
/// Key naming the class in prefixed arguments.
pub const POOL_CLASS_KEY: &str = "poolClassName";
/// Key carrying the ignore flag in prefixed arguments.
pub const IGNORE_MISSING_KEY: &str = "ignoreMissingDatabase";

const POOL_PREFIX: &str = "pool";

/// A data source declared through a flat, `pool`-prefixed argument map.
///
/// ```text
/// dataSource            = synonyms
/// poolClassName         = sqlite
/// poolPath              = /var/lib/terms.db
/// poolLoginTimeout      = 10
/// ignoreMissingDatabase = false
/// ```
///
/// The prefix is stripped and the remainder uncapitalised
/// (`poolLoginTimeout` → `loginTimeout`). Keys without the prefix stay in
/// the map for the host.
#[derive(Debug, Clone)]
pub struct DataSourceArgs {
    pub name: Option<String>,
    pub definition: ResourceDefinition,
}

impl DataSourceArgs {
    /// Remove the data source keys from `args`.
    pub fn take_from(args: &mut IndexMap<String, String>) -> Self {
        let name = args.shift_remove(DATA_SOURCE_KEY);
        let mut definition = ResourceDefinition::new();
        if let Some(class) = args.shift_remove(POOL_CLASS_KEY) {
            definition.insert(CLASS_KEY, class);
        }
        let ignore = args
            .shift_remove(IGNORE_MISSING_KEY)
            .is_none_or(|flag| flag != "false");
        definition.insert(IGNORE_ERRORS_KEY, PropertyValue::Bool(ignore));

        let pooled: Vec<String> = args
            .keys()
            .filter(|key| key.len() > POOL_PREFIX.len() && key.starts_with(POOL_PREFIX))
            .cloned()
            .collect();
        for key in pooled {
            if let Some(value) = args.shift_remove(&key) {
                definition.insert(uncapitalize(&key[POOL_PREFIX.len()..]), value);
            }
        }

        Self { name, definition }
    }
}

fn uncapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
