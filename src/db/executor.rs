use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Database, DbError};
use crate::data::ResultTable;
use crate::query::prepare_statement;

/// Executes generated statements with a row cap and a wall-clock deadline
#[derive(Clone)]
pub struct SqlExecutor {
    database: Arc<dyn Database>,
}

impl SqlExecutor {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Execute `sql`, returning at most `max_rows` rows unless the statement
    /// already carries its own LIMIT.
    pub async fn execute(
        &self,
        sql: &str,
        max_rows: usize,
        timeout_secs: u64,
    ) -> Result<ResultTable, ExecutionError> {
        let statement = prepare_statement(sql, max_rows);
        let start = Instant::now();

        tracing::debug!(sql = %statement, max_rows, timeout_secs, "Executing statement");

        let database = Arc::clone(&self.database);
        let timeout = Duration::from_secs(timeout_secs);
        let outcome =
            tokio::task::spawn_blocking(move || database.query(&statement, timeout)).await;

        match outcome {
            Ok(Ok(table)) => {
                tracing::debug!(
                    rows = table.row_count(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Statement finished"
                );
                Ok(table)
            }
            Ok(Err(DbError::Timeout(_))) => {
                tracing::warn!(timeout_secs, "Statement aborted at its deadline");
                Err(ExecutionError::Timeout {
                    seconds: timeout_secs,
                })
            }
            Ok(Err(e)) => Err(ExecutionError::Engine(e.to_string())),
            Err(join_err) => Err(ExecutionError::Worker(join_err.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Engine error text, verbatim
    #[error("{0}")]
    Engine(String),

    #[error("SQL execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Execution worker failed: {0}")]
    Worker(String),
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDatabase;

    fn executor_with_rows(rows: usize) -> SqlExecutor {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(&format!(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, label TEXT);
             WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {rows})
             INSERT INTO t (id, label) SELECT n, 'row-' || n FROM seq;"
        ))
        .unwrap();
        SqlExecutor::new(Arc::new(db))
    }

    #[tokio::test]
    async fn test_existing_limit_not_reduced() {
        let executor = executor_with_rows(3);
        let result = executor.execute("SELECT * FROM t LIMIT 5", 500, 10).await.unwrap();
        assert_eq!(result.row_count(), 3);
    }

    #[tokio::test]
    async fn test_row_cap_applied() {
        let executor = executor_with_rows(1000);
        let result = executor.execute("SELECT * FROM t", 500, 10).await.unwrap();
        assert_eq!(result.row_count(), 500);
        assert_eq!(result.columns, vec!["id", "label"]);
    }

    #[tokio::test]
    async fn test_trailing_terminator_is_stripped() {
        let executor = executor_with_rows(10);
        let result = executor
            .execute("  SELECT id FROM t WHERE id <= 4;  ", 500, 10)
            .await
            .unwrap();
        assert_eq!(result.row_count(), 4);
    }

    #[tokio::test]
    async fn test_engine_errors_propagate() {
        let executor = executor_with_rows(1);
        let err = executor
            .execute("SELECT missing_column FROM t", 500, 10)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Engine(_)));
        assert!(err.to_string().contains("no such column: missing_column"));
    }

    const RUNAWAY: &str = "WITH RECURSIVE forever(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM forever) \
                           SELECT count(*) FROM forever";

    #[tokio::test]
    async fn test_runaway_statement_times_out() {
        let executor = executor_with_rows(1);
        let err = executor.execute(RUNAWAY, 500, 1).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "SQL execution timed out after 1 seconds");

        // The handle is usable again once the aborted statement unwinds
        let result = executor.execute("SELECT id FROM t", 500, 10).await.unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadlines_are_scoped_to_each_call() {
        let executor = executor_with_rows(1);
        let long_runner = executor.clone();

        let slow = async move {
            let start = Instant::now();
            let outcome = long_runner.execute(RUNAWAY, 500, 2).await;
            (outcome, start.elapsed())
        };
        let quick = async {
            // Queue behind the runaway statement, with a shorter deadline
            tokio::time::sleep(Duration::from_millis(200)).await;
            executor.execute("SELECT 1 AS one", 500, 1).await
        };

        let ((slow_outcome, slow_elapsed), quick_outcome) = tokio::join!(slow, quick);

        // The waiting call's clock starts once it owns the connection
        let quick_result = quick_outcome.unwrap();
        assert_eq!(quick_result.row_count(), 1);

        // The running call ends at its own deadline, not the waiting one's
        assert!(slow_outcome.unwrap_err().is_timeout());
        assert!(slow_elapsed >= Duration::from_millis(1900));
    }
}
