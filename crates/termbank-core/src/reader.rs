//! Query readers: SQL over a resolved data source, exposed as text.
//!
//! A reader runs its SQL, takes the first column of every row, and joins the
//! values with `\n` (no trailing newline). When its data source could not be
//! resolved and the ignore policy is on, it behaves as an empty resource.

use std::io::{Cursor, Read};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::datasource::{DataSource, DataSourceError, QueryRunner};
use crate::loader::VIRTUAL_RESOURCE;
use crate::resolve::{ResolutionChain, ResolveError};

/// Argument holding the SQL.
pub const SQL_PARAM: &str = "sql";
/// Argument naming a data source resolved through the registry and directory.
pub const DATA_SOURCE_PARAM: &str = "dataSource";
/// Argument naming a data source resolved in the directory only.
pub const DIRECTORY_NAME_PARAM: &str = "jndiName";
/// Argument carrying the ignore policy.
pub const IGNORE_PARAM: &str = "ignoreMissingDatabase";

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("missing data source")]
    MissingResource,

    #[error("failed to load data with `{sql}`")]
    QueryExecution {
        sql: String,
        #[source]
        source: DataSourceError,
    },

    #[error("failed to connect to data source '{name}'")]
    Connection {
        name: String,
        #[source]
        source: DataSourceError,
    },

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Row-query API shared by every reader.
pub trait RowReader: Send + Sync {
    /// The query results as a byte stream.
    fn reader(&self) -> Result<Box<dyn Read + Send>, ReaderError>;

    /// A runner over the data source, or `None` when it is missing and
    /// tolerated.
    fn raw_query_runner(&self) -> Result<Option<QueryRunner>, ReaderError>;

    fn sql(&self) -> &str;
}

/// Where a reader's rows come from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDefinition {
    pub sql: String,
    pub data_source_name: Option<String>,
    pub directory_name: Option<String>,
    pub ignore_missing_database: bool,
}

impl QueryDefinition {
    /// Extract a registry-resolved definition from filter arguments.
    ///
    /// Stores [`VIRTUAL_RESOURCE`] under `original_param` so later loads of
    /// that name are answered by the query. The ignore policy defaults to on
    /// and only an explicit `"false"` disables it.
    pub fn from_args(
        args: &mut IndexMap<String, String>,
        original_param: &str,
    ) -> Result<Self, ReaderError> {
        args.insert(original_param.to_string(), VIRTUAL_RESOURCE.to_string());
        let sql = args
            .shift_remove(SQL_PARAM)
            .ok_or(ReaderError::MissingParameter(SQL_PARAM))?;
        let ignore = args
            .shift_remove(IGNORE_PARAM)
            .is_none_or(|flag| flag != "false");
        let data_source_name = args.shift_remove(DATA_SOURCE_PARAM);
        Ok(Self {
            sql,
            data_source_name,
            directory_name: None,
            ignore_missing_database: ignore,
        })
    }

    /// Extract a directory-resolved definition from filter arguments.
    ///
    /// The ignore policy defaults to off and only an explicit `"true"`
    /// enables it.
    pub fn from_directory_args(
        args: &mut IndexMap<String, String>,
        original_param: &str,
    ) -> Result<Self, ReaderError> {
        args.insert(original_param.to_string(), VIRTUAL_RESOURCE.to_string());
        let directory_name = args
            .shift_remove(DIRECTORY_NAME_PARAM)
            .ok_or(ReaderError::MissingParameter(DIRECTORY_NAME_PARAM))?;
        let sql = args
            .shift_remove(SQL_PARAM)
            .ok_or(ReaderError::MissingParameter(SQL_PARAM))?;
        let ignore = args
            .shift_remove(IGNORE_PARAM)
            .is_some_and(|flag| flag == "true");
        Ok(Self {
            sql,
            data_source_name: None,
            directory_name: Some(directory_name),
            ignore_missing_database: ignore,
        })
    }

    fn source_label(&self) -> &str {
        self.directory_name
            .as_deref()
            .or(self.data_source_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Reader over a data source resolved once at construction.
#[derive(Debug)]
pub struct QueryReader {
    sql: String,
    data_source: Option<Arc<dyn DataSource>>,
    ignore: bool,
}

impl QueryReader {
    /// Reader over an already resolved data source.
    pub fn new(
        sql: impl Into<String>,
        data_source: Option<Arc<dyn DataSource>>,
        ignore: bool,
    ) -> Self {
        Self {
            sql: sql.into(),
            data_source,
            ignore,
        }
    }

    /// Resolve the definition's data source and check that it connects.
    ///
    /// A data source that fails the connectivity check is dropped; the
    /// failure is returned unless the ignore policy is on.
    pub fn open(definition: QueryDefinition, chain: &ResolutionChain) -> Result<Self, ReaderError> {
        let ignore = definition.ignore_missing_database;
        let resolved = match &definition.directory_name {
            Some(name) => chain.resolve_in_directory(name, ignore)?,
            None => chain.resolve_optional(definition.data_source_name.as_deref(), ignore)?,
        };

        let data_source = match resolved {
            Some(source) => match source.check_connection() {
                Ok(()) => Some(source),
                Err(err) => {
                    error!(
                        data_source = definition.source_label(),
                        error = %err,
                        "Failed to connect to database of data source"
                    );
                    if !ignore {
                        return Err(ReaderError::Connection {
                            name: definition.source_label().to_string(),
                            source: err,
                        });
                    }
                    None
                }
            },
            None => None,
        };

        Ok(Self::new(definition.sql, data_source, ignore))
    }

    /// Build a registry-resolved reader from filter arguments.
    pub fn from_args(
        args: &mut IndexMap<String, String>,
        original_param: &str,
        chain: &ResolutionChain,
    ) -> Result<Self, ReaderError> {
        Self::open(QueryDefinition::from_args(args, original_param)?, chain)
    }

    /// Build a directory-resolved reader from filter arguments.
    pub fn from_directory_args(
        args: &mut IndexMap<String, String>,
        original_param: &str,
        chain: &ResolutionChain,
    ) -> Result<Self, ReaderError> {
        Self::open(QueryDefinition::from_directory_args(args, original_param)?, chain)
    }

    /// Whether a data source is attached.
    pub fn is_available(&self) -> bool {
        self.data_source.is_some()
    }

    /// Run the query and return the joined lines.
    pub fn content(&self) -> Result<String, ReaderError> {
        let Some(runner) = self.raw_query_runner()? else {
            return Ok(String::new());
        };
        info!(sql = %self.sql, "Querying for data");
        let lines = runner
            .first_column(&self.sql)
            .map_err(|source| ReaderError::QueryExecution {
                sql: self.sql.clone(),
                source,
            })?;
        info!(lines = lines.len(), "Loaded lines");
        Ok(lines.join("\n"))
    }
}

impl RowReader for QueryReader {
    fn reader(&self) -> Result<Box<dyn Read + Send>, ReaderError> {
        Ok(Box::new(Cursor::new(self.content()?.into_bytes())))
    }

    fn raw_query_runner(&self) -> Result<Option<QueryRunner>, ReaderError> {
        match &self.data_source {
            Some(source) => Ok(Some(QueryRunner::new(Arc::clone(source)))),
            None if self.ignore => {
                warn!(sql = %self.sql, "Data source unavailable, serving no rows");
                Ok(None)
            }
            None => Err(ReaderError::MissingResource),
        }
    }

    fn sql(&self) -> &str {
        &self.sql
    }
}
