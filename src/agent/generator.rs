use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::SubTask;
use crate::llm::{prompts, CompletionBackend, LlmError};
use crate::retrieval::{schema_context, RetrievalError, SchemaContextProvider};

/// Message given back to the generator after a failed plausibility check
pub const SYNTAX_FAILURE_MESSAGE: &str = "SQL syntax validation failed. Please check for proper SQL syntax, missing keywords, or malformed statements.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Schema retrieval failed during SQL generation: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation backend failed during SQL generation: {0}")]
    Backend(#[from] LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Syntax,
    Execution,
}

/// Why a statement is being regenerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationHint {
    pub kind: FailureKind,
    /// Attempt that failed (1-based)
    pub attempt: u32,
    pub previous_sql: String,
    pub message: String,
}

impl RegenerationHint {
    pub fn syntax(attempt: u32, previous_sql: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Syntax,
            attempt,
            previous_sql: previous_sql.into(),
            message: SYNTAX_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn execution(
        attempt: u32,
        previous_sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: FailureKind::Execution,
            attempt,
            previous_sql: previous_sql.into(),
            message: message.into(),
        }
    }

    /// Render the sub-task text the backend sees on a retry
    pub fn render(&self, subtask: &SubTask) -> String {
        let (marker, label) = match self.kind {
            FailureKind::Syntax => ("syntax error", "Error"),
            FailureKind::Execution => ("execution error", "Execution error"),
        };
        format!(
            "(Fix {} — Attempt {}) {}. Previous failed query: {}. {}: {}",
            marker,
            self.attempt,
            subtask.prompt_text(),
            self.previous_sql,
            label,
            self.message
        )
    }
}

/// Produces one SQL statement per sub-task
pub struct SqlGenerator {
    backend: Arc<dyn CompletionBackend>,
    retriever: Arc<dyn SchemaContextProvider>,
    search_k: usize,
    dialect: String,
}

impl SqlGenerator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        retriever: Arc<dyn SchemaContextProvider>,
        search_k: usize,
        dialect: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            retriever,
            search_k,
            dialect: dialect.into(),
        }
    }

    /// Generate SQL for `subtask_text`, with earlier successful statements
    /// and the whole request as context
    pub async fn generate(
        &self,
        subtask_text: &str,
        prior_sql: &[String],
        user_request: &str,
    ) -> Result<String, GenerationError> {
        let retrieval_query = format!("{}\n\n{}", user_request, subtask_text);
        let context =
            schema_context(self.retriever.as_ref(), &retrieval_query, self.search_k).await?;

        let user_prompt = prompts::sql_user(
            &self.dialect,
            subtask_text,
            &context,
            &prompts::format_prior_sql(prior_sql),
        );
        let reply = self.backend.complete(prompts::SQL_SYSTEM, &user_prompt).await?;

        let sql = extract_sql(&reply);
        tracing::debug!(sql = %sql, "Generated SQL");
        Ok(sql)
    }

    /// Regenerate after a failed attempt
    pub async fn regenerate(
        &self,
        subtask: &SubTask,
        hint: &RegenerationHint,
        prior_sql: &[String],
        user_request: &str,
    ) -> Result<String, GenerationError> {
        self.generate(&hint.render(subtask), prior_sql, user_request)
            .await
    }
}

fn fenced_block() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("valid fence regex"))
}

/// Contents of the first fenced code block, or the whole reply trimmed
pub fn extract_sql(reply: &str) -> String {
    match fenced_block().captures(reply).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => reply.trim().to_string(),
    }
}
