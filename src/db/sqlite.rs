use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::{run_with_deadline, ColumnInfo, Database, DbError};
use crate::data::{ResultTable, Value};

/// SQLite-backed connection handle
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| DbError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Private in-memory database, mostly for tests and demos
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::Open {
            path: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a script of statements, discarding any rows
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

fn collect_rows(conn: &Connection, sql: &str) -> Result<ResultTable, DbError> {
    let mut stmt = conn.prepare(sql)?;

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let width = columns.len();

    let mut out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(Value::from(row.get_ref(idx)?));
        }
        out.push(values);
    }

    Ok(ResultTable::new(columns, out))
}

impl Database for SqliteDatabase {
    fn query(&self, sql: &str, timeout: Duration) -> Result<ResultTable, DbError> {
        let conn = self.conn.lock();
        run_with_deadline(&conn, timeout, |conn| collect_rows(conn, sql))
    }

    fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        let conn = self.conn.lock();
        let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let mut stmt = conn.prepare(&pragma)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                    primary_key: row.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }
        Ok(columns)
    }

    fn schema_ddl(&self) -> Result<Vec<String>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master \
             WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let ddl = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ddl)
    }

    fn dialect(&self) -> &'static str {
        "SQLite"
    }
}
