//! Fixtures implementing the core traits.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tempfile::TempDir;
use termbank_core::{
    DataSource, DataSourceError, Generation, GenerationAware, HookError, LoadError, Resource,
    ResourceKind, ResourceLoader, Row, Stage, Value,
};

/// A SQLite database file in a temporary directory, seeded with word tables.
///
/// The directory is deleted when the fixture is dropped.
pub struct SqliteFixture {
    path: PathBuf,
    _dir: TempDir,
}

impl SqliteFixture {
    /// An empty database.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("terms.db");
        Connection::open(&path).expect("failed to create database");
        Self { path, _dir: dir }
    }

    /// A database with a `stopwords(word)` table holding `words` in order.
    pub fn with_words(words: &[&str]) -> Self {
        let fixture = Self::new();
        fixture.execute("CREATE TABLE stopwords (id INTEGER PRIMARY KEY, word TEXT)");
        fixture.insert_words(words);
        fixture
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a batch of statements.
    pub fn execute(&self, sql: &str) {
        self.connection()
            .execute_batch(sql)
            .expect("failed to execute fixture SQL");
    }

    /// Append rows to `stopwords`.
    pub fn insert_words(&self, words: &[&str]) {
        let conn = self.connection();
        for word in words {
            conn.execute("INSERT INTO stopwords (word) VALUES (?1)", [word])
                .expect("failed to insert word");
        }
    }

    fn connection(&self) -> Connection {
        Connection::open(&self.path).expect("failed to open fixture database")
    }
}

impl Default for SqliteFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory data source returning fixed rows for every query.
///
/// Counts queries and connectivity checks; either can be made to fail.
#[derive(Debug, Default)]
pub struct FixedRows {
    rows: Mutex<Vec<Row>>,
    queries: AtomicUsize,
    checks: AtomicUsize,
    offline: AtomicBool,
    failing_queries: AtomicBool,
}

impl FixedRows {
    /// One text row per line.
    pub fn lines(lines: &[&str]) -> Arc<Self> {
        let rows = lines
            .iter()
            .map(|line| vec![Value::Text(line.to_string())])
            .collect();
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Self::default()
        })
    }

    pub fn rows(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Self::default()
        })
    }

    pub fn set_lines(&self, lines: &[&str]) {
        *self.rows.lock().expect("rows lock poisoned") = lines
            .iter()
            .map(|line| vec![Value::Text(line.to_string())])
            .collect();
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_failing_queries(&self, failing: bool) {
        self.failing_queries.store(failing, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl DataSource for FixedRows {
    fn check_connection(&self) -> Result<(), DataSourceError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(DataSourceError::Connection("fixture offline".to_string()));
        }
        Ok(())
    }

    fn query(&self, _sql: &str) -> Result<Vec<Row>, DataSourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(DataSourceError::Query("fixture query failure".to_string()));
        }
        Ok(self.rows.lock().expect("rows lock poisoned").clone())
    }
}

impl Resource for FixedRows {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DataSource
    }

    fn as_data_source(self: Arc<Self>) -> Option<Arc<dyn DataSource>> {
        Some(self)
    }
}

/// A resource that is not a data source.
#[derive(Debug, Default)]
pub struct PlainResource;

impl Resource for PlainResource {}

/// A reload-aware stage that records the generations it was told about.
#[derive(Debug, Default)]
pub struct RecordingStage {
    name: String,
    seen: Mutex<Vec<u64>>,
    fail: AtomicBool,
}

impl RecordingStage {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    /// Make the hook fail from now on.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Generation numbers seen, in order.
    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().expect("seen lock poisoned").clone()
    }

    pub fn calls(&self) -> usize {
        self.seen().len()
    }
}

impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn generation_aware(&self) -> Option<&dyn GenerationAware> {
        Some(self)
    }
}

impl GenerationAware for RecordingStage {
    fn inform_of_new_generation(&self, generation: &Generation) -> Result<(), HookError> {
        self.seen
            .lock()
            .expect("seen lock poisoned")
            .push(generation.number());
        if self.fail.load(Ordering::SeqCst) {
            return Err(format!("{} refused generation {}", self.name, generation.number()).into());
        }
        Ok(())
    }
}

/// A stage without a reload hook.
#[derive(Debug)]
pub struct PassiveStage(pub &'static str);

impl Stage for PassiveStage {
    fn name(&self) -> &str {
        self.0
    }
}

/// Loader serving fixed in-memory resources.
#[derive(Debug, Default)]
pub struct StaticLoader {
    resources: HashMap<String, String>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, content: &str) -> Self {
        self.resources.insert(name.to_string(), content.to_string());
        self
    }
}

impl ResourceLoader for StaticLoader {
    fn open_resource(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        self.resources
            .get(name)
            .map(|content| {
                Box::new(Cursor::new(content.clone().into_bytes())) as Box<dyn Read + Send>
            })
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

/// Read a whole stream into a string.
pub fn read_to_string(mut stream: Box<dyn Read + Send>) -> String {
    let mut out = String::new();
    stream
        .read_to_string(&mut out)
        .expect("failed to read stream");
    out
}
