//! Relational engine boundary and the bounded statement executor.

pub mod deadline;
pub mod executor;
pub mod sqlite;

pub use deadline::run_with_deadline;
pub use executor::{ExecutionError, SqlExecutor};
pub use sqlite::SqliteDatabase;

use serde::Serialize;
use std::time::Duration;

use crate::data::ResultTable;

/// A connection handle to the relational engine.
///
/// Calls are blocking; the executor moves them off the async runtime.
pub trait Database: Send + Sync {
    /// Run one raw, parameterless statement and collect its rows.
    ///
    /// `timeout` bounds this statement only, counted from the moment it owns
    /// the connection.
    fn query(&self, sql: &str, timeout: Duration) -> Result<ResultTable, DbError>;

    /// User tables, sorted by name
    fn list_tables(&self) -> Result<Vec<String>, DbError>;

    /// Column layout of one table
    fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError>;

    /// CREATE statements for every user object
    fn schema_ddl(&self) -> Result<Vec<String>, DbError>;

    /// Dialect name given to the generation backend
    fn dialect(&self) -> &'static str;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Error text exactly as the engine reported it
    #[error("{0}")]
    Engine(String),

    #[error("Statement exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("Table '{0}' not found")]
    UnknownTable(String),

    #[error("Failed to open database {path}: {message}")]
    Open { path: String, message: String },
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Engine(e.to_string())
    }
}
