use serde::Serialize;

use super::{GenerationError, RegenerationHint, SqlGenerator, SubTask};
use crate::data::ResultTable;
use crate::db::SqlExecutor;
use crate::query::is_plausible;

/// Outcome of one sub-task
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// 1-based position in the executed sequence
    pub step_id: usize,
    pub title: String,
    pub description: String,
    /// Most recent statement tried
    pub sql: Option<String>,
    pub result: Option<ResultTable>,
    pub error: Option<String>,
    /// Every statement tried, initial generation first
    pub attempted_sql: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Succeeded,
    Failed,
}

impl StepResult {
    pub fn new(step_id: usize, subtask: &SubTask) -> Self {
        Self {
            step_id,
            title: subtask.title.clone(),
            description: subtask.description.clone(),
            sql: None,
            result: None,
            error: None,
            attempted_sql: Vec::new(),
        }
    }

    pub fn status(&self) -> StepStatus {
        match (&self.result, &self.error) {
            (_, Some(_)) => StepStatus::Failed,
            (Some(_), None) => StepStatus::Succeeded,
            (None, None) => StepStatus::Pending,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == StepStatus::Succeeded
    }

    pub fn row_count(&self) -> usize {
        self.result.as_ref().map_or(0, ResultTable::row_count)
    }

    fn record_attempt(&mut self, sql: String) {
        self.attempted_sql.push(sql.clone());
        self.sql = Some(sql);
    }
}

/// Drives the generate, validate, execute and regenerate loop for one
/// sub-task.
///
/// Syntax and execution failures draw on the same attempt budget. The
/// initial generation is not counted as an attempt.
pub struct StepExecutor {
    generator: SqlGenerator,
    executor: SqlExecutor,
    max_rows: usize,
    timeout_secs: u64,
}

impl StepExecutor {
    pub fn new(
        generator: SqlGenerator,
        executor: SqlExecutor,
        max_rows: usize,
        timeout_secs: u64,
    ) -> Self {
        Self {
            generator,
            executor,
            max_rows,
            timeout_secs,
        }
    }

    /// Run one sub-task to a terminal state.
    ///
    /// A step that exhausts its budget is returned with `error` set. Only a
    /// generation failure (backend or retrieval unreachable) is an `Err`.
    pub async fn run_step(
        &self,
        step_id: usize,
        subtask: &SubTask,
        prior_sql: &[String],
        user_request: &str,
        max_retries: u32,
    ) -> Result<StepResult, GenerationError> {
        let budget = max_retries.max(1);
        let mut step = StepResult::new(step_id, subtask);

        tracing::info!(step = step_id, title = %subtask.title, "Running step");

        let mut current = self
            .generator
            .generate(&subtask.prompt_text(), prior_sql, user_request)
            .await?;
        step.record_attempt(current.clone());

        for attempt in 1..=budget {
            tracing::debug!(step = step_id, attempt, budget, "Attempting statement");

            let hint = if !is_plausible(&current) {
                tracing::warn!(step = step_id, attempt, "SQL failed plausibility check");
                if attempt == budget {
                    step.error = Some(format!(
                        "SQL syntax validation failed after {} attempts. Attempted queries: {}",
                        budget,
                        step.attempted_sql.join("; ")
                    ));
                    break;
                }
                RegenerationHint::syntax(attempt, current.as_str())
            } else {
                match self
                    .executor
                    .execute(&current, self.max_rows, self.timeout_secs)
                    .await
                {
                    Ok(table) => {
                        tracing::info!(
                            step = step_id,
                            attempt,
                            rows = table.row_count(),
                            "Step succeeded"
                        );
                        step.result = Some(table);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(step = step_id, attempt, error = %e, "SQL execution failed");
                        if attempt == budget {
                            step.error = Some(format!(
                                "SQL execution failed after {} attempts. Last error: {}. Attempted queries: {}",
                                budget,
                                e,
                                step.attempted_sql.join("; ")
                            ));
                            break;
                        }
                        RegenerationHint::execution(attempt, current.as_str(), e.to_string())
                    }
                }
            };

            current = self
                .generator
                .regenerate(subtask, &hint, prior_sql, user_request)
                .await?;
            step.record_attempt(current.clone());
        }

        if let Some(error) = &step.error {
            tracing::warn!(step = step_id, attempts = step.attempted_sql.len(), %error, "Step failed");
        }

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{employee_database, ScriptedBackend, StaticRetriever};
    use std::sync::Arc;

    fn step_executor(backend: Arc<ScriptedBackend>) -> StepExecutor {
        let retriever = Arc::new(StaticRetriever::new(vec!["employees(id, name, salary)"]));
        let generator = SqlGenerator::new(backend, retriever, 6, "SQLite");
        StepExecutor::new(generator, SqlExecutor::new(employee_database()), 500, 10)
    }

    fn task() -> SubTask {
        SubTask::new("Get names", "list employee names")
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let backend = Arc::new(ScriptedBackend::new(vec!["SELECT name FROM employees"]));
        let step = step_executor(backend.clone())
            .run_step(1, &task(), &[], "names please", 2)
            .await
            .unwrap();

        assert!(step.is_success());
        assert_eq!(step.row_count(), 4);
        assert_eq!(step.sql.as_deref(), Some("SELECT name FROM employees"));
        assert_eq!(step.attempted_sql.len(), 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_two_engine_errors() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "SELECT nam FROM employees",
            "SELECT name FROM employes",
            "SELECT name FROM employees",
        ]));
        let step = step_executor(backend.clone())
            .run_step(1, &task(), &[], "names please", 3)
            .await
            .unwrap();

        assert!(step.is_success());
        assert_eq!(step.error, None);
        assert_eq!(
            step.attempted_sql,
            vec![
                "SELECT nam FROM employees",
                "SELECT name FROM employes",
                "SELECT name FROM employees"
            ]
        );
        assert_eq!(step.sql.as_deref(), Some("SELECT name FROM employees"));

        let calls = backend.calls();
        assert!(calls[1].1.contains("(Fix execution error — Attempt 1)"));
        assert!(calls[1].1.contains("no such column: nam"));
        assert!(calls[2].1.contains("(Fix execution error — Attempt 2)"));
        assert!(calls[2].1.contains("no such table: employes"));
    }

    #[tokio::test]
    async fn test_execution_budget_exhausted() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "SELECT nope FROM employees",
            "SELECT still_nope FROM employees",
        ]));
        let step = step_executor(backend.clone())
            .run_step(1, &task(), &[], "names please", 2)
            .await
            .unwrap();

        assert_eq!(step.status(), StepStatus::Failed);
        assert!(step.result.is_none());
        let error = step.error.unwrap();
        assert!(error.starts_with("SQL execution failed after 2 attempts. Last error: no such column: still_nope."));
        assert!(error.ends_with(
            "Attempted queries: SELECT nope FROM employees; SELECT still_nope FROM employees"
        ));
        // No regeneration after the final attempt
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_syntax_failure_shares_budget() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            "```sql\n```",
            "SELECT name FROM employees WHERE salary > 90000",
        ]));
        let step = step_executor(backend.clone())
            .run_step(1, &task(), &[], "rich people", 2)
            .await
            .unwrap();

        assert!(step.is_success());
        assert_eq!(step.row_count(), 2);
        assert_eq!(step.attempted_sql[0], "");

        let calls = backend.calls();
        assert!(calls[1].1.contains("(Fix syntax error — Attempt 1)"));
        assert!(calls[1].1.contains("SQL syntax validation failed."));
    }

    #[tokio::test]
    async fn test_syntax_budget_exhausted() {
        let backend = Arc::new(ScriptedBackend::new(vec!["   ", "-- just a comment"]));
        let step = step_executor(backend)
            .run_step(3, &task(), &[], "anything", 2)
            .await
            .unwrap();

        assert_eq!(step.step_id, 3);
        assert_eq!(
            step.error.as_deref(),
            Some("SQL syntax validation failed after 2 attempts. Attempted queries: ; -- just a comment")
        );
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let backend = Arc::new(ScriptedBackend::new(vec!["SELECT nope FROM employees"]));
        let step = step_executor(backend.clone())
            .run_step(1, &task(), &[], "anything", 0)
            .await
            .unwrap();

        assert_eq!(step.status(), StepStatus::Failed);
        assert!(step.error.unwrap().contains("after 1 attempts"));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_is_an_error() {
        let backend = Arc::new(ScriptedBackend::new(vec!["SELECT nope FROM employees"]));
        // Script runs out on the regeneration call
        let err = step_executor(backend)
            .run_step(1, &task(), &[], "anything", 2)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Backend(_)));
    }

    #[tokio::test]
    async fn test_prior_sql_reaches_prompt() {
        let backend = Arc::new(ScriptedBackend::new(vec!["SELECT 1"]));
        let prior = vec!["SELECT id FROM employees".to_string()];
        step_executor(backend.clone())
            .run_step(2, &task(), &prior, "anything", 2)
            .await
            .unwrap();

        assert!(backend.calls()[0].1.contains("-- Step 1\nSELECT id FROM employees"));
    }
}
