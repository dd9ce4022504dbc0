//! Resolution chain and virtual resource behaviour end to end.

use std::sync::Arc;

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use termbank_core::directory::DIRECTORY_SCOPE;
use termbank_core::loader::VIRTUAL_RESOURCE;
use termbank_core::{
    BuildError, LoadError, MemoryDirectory, QueryReader, ReaderError, ResolutionChain,
    ResolveError, ResourceLoader, ResourceRegistry, RowReader, SharedResource,
    VirtualResourceLoader,
};
use termbank_test_utils::fixtures::{FixedRows, PlainResource, StaticLoader, read_to_string};
use termbank_test_utils::log_capture::capture;
use tracing::Level;

struct Setup {
    registry: Arc<ResourceRegistry>,
    directory: Arc<MemoryDirectory>,
    chain: ResolutionChain,
}

fn setup() -> Setup {
    let registry = Arc::new(ResourceRegistry::new());
    let directory = Arc::new(MemoryDirectory::new());
    let chain = ResolutionChain::new(Arc::clone(&registry), directory.clone());
    Setup {
        registry,
        directory,
        chain,
    }
}

fn register(registry: &ResourceRegistry, name: &str, resource: SharedResource) {
    registry
        .get_or_create(name, || Ok::<_, BuildError>(Some(resource)))
        .unwrap();
}

fn args(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_registry_entry_wins_over_directory_binding() {
    let s = setup();
    let from_registry = FixedRows::lines(&["registry"]);
    register(&s.registry, "ds1", from_registry.clone());
    s.directory
        .bind(format!("{DIRECTORY_SCOPE}ds1"), FixedRows::lines(&["directory"]));

    let mut params = args(&[("sql", "SELECT w"), ("dataSource", "ds1")]);
    let reader = QueryReader::from_args(&mut params, "words", &s.chain).unwrap();
    assert_eq!(reader.content().unwrap(), "registry");
    assert_eq!(from_registry.query_count(), 1);
}

#[test]
fn test_directory_fallback() {
    let s = setup();
    s.directory
        .bind("comp/env/ds1", FixedRows::lines(&["directory"]));

    let mut params = args(&[("sql", "SELECT w"), ("dataSource", "ds1")]);
    let reader = QueryReader::from_args(&mut params, "words", &s.chain).unwrap();
    assert_eq!(reader.content().unwrap(), "directory");
}

#[test]
fn test_unresolved_name_is_logged_when_ignored() {
    let s = setup();
    let (reader, logs) = capture(|| {
        let mut params = args(&[("sql", "SELECT w"), ("dataSource", "absent")]);
        QueryReader::from_args(&mut params, "words", &s.chain)
    });
    let reader = reader.unwrap();
    assert!(!reader.is_available());
    assert!(logs.contains(Level::WARN, "Data source not found"));

    let (content, logs) = capture(|| reader.content());
    assert_eq!(content.unwrap(), "");
    assert!(logs.contains(Level::WARN, "Data source unavailable"));
}

#[test]
fn test_directory_protocol_error_always_propagates() {
    let s = setup();
    s.directory.fail_with("ldap unreachable");
    let mut params = args(&[("sql", "SELECT w"), ("dataSource", "ds1")]);
    assert!(matches!(
        QueryReader::from_args(&mut params, "words", &s.chain),
        Err(ReaderError::Resolve(ResolveError::NamingProtocol { .. }))
    ));
}

#[test]
fn test_wrong_kind_in_directory_propagates() {
    let s = setup();
    s.directory.bind("comp/env/ds1", Arc::new(PlainResource));
    assert!(matches!(
        s.chain.resolve("ds1", true),
        Err(ResolveError::KindMismatch { .. })
    ));
}

#[test]
fn test_connection_check_failure() {
    let s = setup();
    let offline = FixedRows::lines(&["x"]);
    offline.set_offline(true);
    register(&s.registry, "ds1", offline.clone());

    let mut strict = args(&[
        ("sql", "SELECT w"),
        ("dataSource", "ds1"),
        ("ignoreMissingDatabase", "false"),
    ]);
    assert!(matches!(
        QueryReader::from_args(&mut strict, "words", &s.chain),
        Err(ReaderError::Connection { .. })
    ));

    let mut tolerant = args(&[("sql", "SELECT w"), ("dataSource", "ds1")]);
    let reader = QueryReader::from_args(&mut tolerant, "words", &s.chain).unwrap();
    assert!(!reader.is_available());
    assert_eq!(offline.check_count(), 2);
    assert_eq!(offline.query_count(), 0);
}

#[test]
fn test_reserved_name_served_from_query_rows() {
    let s = setup();
    register(&s.registry, "ds1", FixedRows::lines(&["a", "b", "c"]));
    let mut params = args(&[
        ("words", "stopwords.txt"),
        ("sql", "SELECT w"),
        ("dataSource", "ds1"),
    ]);
    let reader = Arc::new(QueryReader::from_args(&mut params, "words", &s.chain).unwrap());
    assert_eq!(params["words"], VIRTUAL_RESOURCE);

    let parent = Arc::new(StaticLoader::new().with("protwords.txt", "keep"));
    let loader = VirtualResourceLoader::new(parent, reader);

    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut loader.open_resource("database").unwrap(), &mut bytes).unwrap();
    assert_eq!(bytes, b"a\nb\nc");
    assert_eq!(read_to_string(loader.open_resource("protwords.txt").unwrap()), "keep");
    assert!(matches!(
        loader.open_resource("other.txt"),
        Err(LoadError::NotFound(_))
    ));
}

#[test]
fn test_reserved_name_without_data_source() {
    let parent = Arc::new(StaticLoader::new());

    let tolerant = VirtualResourceLoader::new(
        parent.clone(),
        Arc::new(QueryReader::new("SELECT w", None, true)),
    );
    assert_eq!(read_to_string(tolerant.open_resource("database").unwrap()), "");

    let strict = VirtualResourceLoader::new(
        parent,
        Arc::new(QueryReader::new("SELECT w", None, false)),
    );
    assert!(matches!(
        strict.open_resource("database"),
        Err(LoadError::Reader(ReaderError::MissingResource))
    ));
}

#[test]
fn test_query_failure_surfaces_through_loader() {
    let source = FixedRows::lines(&["a"]);
    source.set_failing_queries(true);
    let reader = QueryReader::new("SELECT w", Some(source), true);
    assert!(matches!(
        reader.raw_query_runner(),
        Ok(Some(_))
    ));
    let loader = VirtualResourceLoader::new(Arc::new(StaticLoader::new()), Arc::new(reader));
    assert!(matches!(
        loader.open_resource("database"),
        Err(LoadError::Reader(ReaderError::QueryExecution { .. }))
    ));
}

#[test]
fn test_directory_reader_from_args() {
    let s = setup();
    s.directory.bind("comp/env/terms", FixedRows::lines(&["x", "y"]));
    let mut params = args(&[
        ("synonyms", "synonyms.txt"),
        ("jndiName", "terms"),
        ("sql", "SELECT a, b FROM synonyms"),
        ("expand", "true"),
    ]);
    let reader = QueryReader::from_directory_args(&mut params, "synonyms", &s.chain).unwrap();
    assert_eq!(reader.content().unwrap(), "x\ny");
    assert_eq!(
        params,
        args(&[("synonyms", VIRTUAL_RESOURCE), ("expand", "true")])
    );
}
