//! Data sources and the query runner over them.

mod sqlite;

pub use sqlite::SqliteDataSource;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// One column value of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Text form used for line-oriented output. NULL maps to the empty
    /// string and blobs are decoded lossily.
    pub fn to_line(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(n) => n.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// A result row, columns in select order.
pub type Row = Vec<Value>;

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// A resource that can run SQL.
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Verify that a connection can be obtained.
    fn check_connection(&self) -> Result<(), DataSourceError>;

    /// Run `sql` and collect every row.
    fn query(&self, sql: &str) -> Result<Vec<Row>, DataSourceError>;
}

/// Runs queries against one data source.
#[derive(Debug, Clone)]
pub struct QueryRunner {
    source: Arc<dyn DataSource>,
}

impl QueryRunner {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Run `sql` and return all rows.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>, DataSourceError> {
        debug!(sql, "Running query");
        self.source.query(sql)
    }

    /// Run `sql` and hand the rows to `handler`.
    pub fn query_with<T, F>(&self, sql: &str, handler: F) -> Result<T, DataSourceError>
    where
        F: FnOnce(Vec<Row>) -> T,
    {
        self.query(sql).map(handler)
    }

    /// Run `sql` and return the first column of every row as text.
    pub fn first_column(&self, sql: &str) -> Result<Vec<String>, DataSourceError> {
        self.query_with(sql, |rows| {
            rows.iter()
                .map(|row| row.first().map(Value::to_line).unwrap_or_default())
                .collect()
        })
    }
}
