#![deny(unsafe_code)]

//! termbank core runtime.
//!
//! Provides the shared resource registry that analysis plugins draw their
//! long-lived resources (connection pools and the like) from, the builder that
//! turns declarative definitions into configured objects, the resolution
//! chain that falls back from the registry to an external directory, the
//! query-backed virtual resources handed to consumers in place of files, and
//! the broadcaster that tells reload-aware consumers about each new
//! generation.
//!
//! Hosts wire these together through [`ResourceContext`].

// Lets `#[derive(Configurable)]` expand to `::termbank_core::...` inside
// this crate as well.
extern crate self as termbank_core;

/// Declarative builder and the factory table of known classes.
pub mod builder;
/// Host entry points tying registry, builder, and directory together.
pub mod context;
/// Data source capability, query runner, and the SQLite implementation.
pub mod datasource;
/// External naming/directory service abstraction.
pub mod directory;
/// Resource loaders, including the query-backed virtual resource loader.
pub mod loader;
/// Typed property binding used by the builder.
pub mod property;
/// Query readers over resolved data sources.
pub mod reader;
/// Named resource registry with at-most-once construction.
pub mod registry;
/// Generation reload broadcasting over the schema graph.
pub mod reload;
/// Registry-then-directory resolution of data sources.
pub mod resolve;
/// The resource capability trait stored by the registry.
pub mod resource;
/// Reload-aware word list stage backed by a query reader.
pub mod wordlist;

pub use builder::{BuildError, DataSourceArgs, FactoryTable, ResourceBuilder};
pub use context::{ContextError, ResourceContext};
pub use datasource::{DataSource, DataSourceError, QueryRunner, Row, SqliteDataSource, Value};
pub use directory::{Directory, DirectoryError, MemoryDirectory};
pub use loader::{FsResourceLoader, LoadError, ResourceLoader, VirtualResourceLoader};
pub use property::{Configurable, FromPropertyValue, PropertyError};
pub use reader::{QueryDefinition, QueryReader, ReaderError, RowReader};
pub use registry::{RegistryError, ResourceRegistry};
pub use reload::{
    AnalysisChain, Analyzer, BroadcastReport, FieldType, Generation, GenerationAware,
    GenerationBroadcaster, HookError, ReloadError, Schema, Stage,
};
pub use resolve::{ResolutionChain, ResolveError};
pub use resource::{Resource, ResourceKind, SharedResource};
pub use termbank_config::{PropertyValue, ResourceDefinition};
pub use termbank_macros::Configurable;
pub use wordlist::WordListStage;
