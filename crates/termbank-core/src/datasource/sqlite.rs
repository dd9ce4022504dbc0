use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use super::{DataSource, DataSourceError, Row, Value};
use crate::property::{FromPropertyValue, PropertyError};
use crate::resource::{Resource, ResourceKind};
use crate::Configurable;
use termbank_config::PropertyValue;

/// SQLite-backed data source, registered as class `sqlite`.
///
/// Properties: `path` (required, or `:memory:`), `readOnly`,
/// `createIfMissing`, `busyTimeout` (milliseconds) and `loginTimeout`
/// (seconds to wait on a locked database while checking connectivity; 0
/// keeps `busyTimeout`). The connection is opened on first use and reused.
#[derive(Debug, Configurable)]
pub struct SqliteDataSource {
    #[property(with = "Self::set_path")]
    path: String,
    read_only: bool,
    create_if_missing: bool,
    busy_timeout: u64,
    login_timeout: u64,
    #[property(skip)]
    connection: Mutex<Option<Connection>>,
}

impl Default for SqliteDataSource {
    fn default() -> Self {
        Self {
            path: String::new(),
            read_only: false,
            create_if_missing: true,
            busy_timeout: 5000,
            login_timeout: 0,
            connection: Mutex::new(None),
        }
    }
}

impl SqliteDataSource {
    /// Data source over the database file at `path`.
    pub fn open(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn set_path(&mut self, value: &PropertyValue) -> Result<(), PropertyError> {
        let path = String::from_property(value)?;
        if path.trim().is_empty() {
            return Err(PropertyError::Rejected("path must not be empty".to_string()));
        }
        self.path = path;
        Ok(())
    }

    fn flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DataSourceError>,
    ) -> Result<T, DataSourceError> {
        let mut guard = self.connection.lock();
        if guard.is_none() {
            if self.path.is_empty() {
                return Err(DataSourceError::Connection(
                    "no database path configured".to_string(),
                ));
            }
            let conn = Connection::open_with_flags(&self.path, self.flags())
                .map_err(|e| DataSourceError::Connection(format!("{}: {e}", self.path)))?;
            conn.busy_timeout(Duration::from_millis(self.busy_timeout))
                .map_err(|e| DataSourceError::Connection(e.to_string()))?;
            info!(path = %self.path, read_only = self.read_only, "Opened SQLite database");
            *guard = Some(conn);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(DataSourceError::Connection("connection unavailable".to_string())),
        }
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

impl DataSource for SqliteDataSource {
    fn check_connection(&self) -> Result<(), DataSourceError> {
        self.with_connection(|conn| {
            if self.login_timeout > 0 {
                conn.busy_timeout(Duration::from_secs(self.login_timeout))
                    .map_err(|e| DataSourceError::Connection(e.to_string()))?;
            }
            let probe = conn
                .query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| DataSourceError::Connection(e.to_string()));
            if self.login_timeout > 0 {
                conn.busy_timeout(Duration::from_millis(self.busy_timeout))
                    .map_err(|e| DataSourceError::Connection(e.to_string()))?;
            }
            probe
        })
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>, DataSourceError> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| DataSourceError::Query(e.to_string()))?;
            let columns = stmt.column_count();
            let mut rows = stmt
                .query([])
                .map_err(|e| DataSourceError::Query(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(|e| DataSourceError::Query(e.to_string()))? {
                let mut values = Vec::with_capacity(columns);
                for i in 0..columns {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| DataSourceError::Query(e.to_string()))?;
                    values.push(to_value(value));
                }
                out.push(values);
            }
            debug!(rows = out.len(), "Query finished");
            Ok(out)
        })
    }
}

impl Resource for SqliteDataSource {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DataSource
    }

    fn as_data_source(self: Arc<Self>) -> Option<Arc<dyn DataSource>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seeded() -> (tempfile::TempDir, SqliteDataSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE words (word TEXT, weight INTEGER);
             INSERT INTO words VALUES ('a', 1), ('b', NULL), (NULL, 3);",
        )
        .unwrap();
        let source = SqliteDataSource::open(path.to_string_lossy());
        (dir, source)
    }

    #[test]
    fn test_query_returns_typed_rows() {
        let (_dir, source) = seeded();
        let rows = source.query("SELECT word, weight FROM words ORDER BY rowid").unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Text("a".into()), Value::Integer(1)],
                vec![Value::Text("b".into()), Value::Null],
                vec![Value::Null, Value::Integer(3)],
            ]
        );
    }

    #[test]
    fn test_bad_sql_is_a_query_error() {
        let (_dir, source) = seeded();
        assert!(matches!(
            source.query("SELECT nope FROM missing"),
            Err(DataSourceError::Query(_))
        ));
    }

    #[test]
    fn test_check_connection() {
        let (_dir, source) = seeded();
        source.check_connection().unwrap();

        let missing = SqliteDataSource {
            path: "/nonexistent/dir/x.db".to_string(),
            create_if_missing: false,
            ..SqliteDataSource::default()
        };
        assert!(matches!(
            missing.check_connection(),
            Err(DataSourceError::Connection(_))
        ));
        assert!(SqliteDataSource::default().check_connection().is_err());
    }

    #[test]
    fn test_properties_by_camel_case_name() {
        let mut source = SqliteDataSource::default();
        assert_eq!(
            source.property_names(),
            &["path", "readOnly", "createIfMissing", "busyTimeout", "loginTimeout"]
        );
        source.set_property("path", &PropertyValue::from(":memory:")).unwrap();
        source.set_property("readOnly", &PropertyValue::from("true")).unwrap();
        source.set_property("busyTimeout", &PropertyValue::from(250i64)).unwrap();
        assert_eq!(source.path(), ":memory:");
        assert!(source.read_only);
        assert_eq!(source.busy_timeout, 250);

        assert!(matches!(
            source.set_property("path", &PropertyValue::from("  ")),
            Err(PropertyError::Rejected(_))
        ));
        assert_eq!(
            source.set_property("poolSize", &PropertyValue::from(1i64)),
            Err(PropertyError::Unknown)
        );
    }

    #[test]
    fn test_in_memory_database() {
        let source = SqliteDataSource::open(":memory:");
        let rows = source.query("SELECT 'x' UNION ALL SELECT 'y'").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(source.kind(), ResourceKind::DataSource);
    }
}
