use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{GenerationError, PlanningError, SqlGenerator, StepExecutor, StepResult, TaskPlanner};
use crate::config::{BackendKind, Config, LlmConfig, RetrievalConfig};
use crate::db::{Database, DbError, SqlExecutor, SqliteDatabase};
use crate::llm::{
    CompletionBackend, LlmError, OllamaClient, Retrying, TextCompletionClient,
};
use crate::retrieval::{
    load_documents, CachedRetriever, LexicalIndex, RetrievalCacheStats, RetrievalError,
    SchemaContextProvider,
};

/// Characters of SQL kept in an execution summary
const SQL_PREVIEW_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("SQL generation failed at step {step}: {source}")]
    Generation {
        step: usize,
        #[source]
        source: GenerationError,
    },
}

/// Failure to assemble the pipeline's collaborators
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Database setup failed: {0}")]
    Database(#[from] DbError),

    #[error("Generation backend setup failed: {0}")]
    Backend(#[from] LlmError),

    #[error("Retrieval setup failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Tunables for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_steps: usize,
    pub per_step_retries: u32,
    pub search_k: usize,
    pub max_rows: usize,
    pub sql_timeout_secs: u64,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_steps: config.agent.max_steps,
            per_step_retries: config.agent.per_step_retries,
            search_k: config.retrieval.search_k,
            max_rows: config.database.max_rows,
            sql_timeout_secs: config.database.timeout_secs,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One row of the per-step execution summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExecutionStep {
    pub step: usize,
    pub success: bool,
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_preview: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub message: String,
}

impl ComponentHealth {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub backend: ComponentHealth,
    pub database: ComponentHealth,
    pub retrieval: ComponentHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_cache: Option<RetrievalCacheStats>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.backend.healthy && self.database.healthy && self.retrieval.healthy
    }
}

/// Plans a request and runs its steps in order, stopping at the first
/// failed step
pub struct Pipeline {
    planner: TaskPlanner,
    steps: StepExecutor,
    backend: Arc<dyn CompletionBackend>,
    retriever: Arc<dyn SchemaContextProvider>,
    database: Arc<dyn Database>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        retriever: Arc<dyn SchemaContextProvider>,
        database: Arc<dyn Database>,
        settings: PipelineSettings,
    ) -> Self {
        let planner = TaskPlanner::new(
            Arc::clone(&backend),
            Arc::clone(&retriever),
            settings.search_k,
        );
        let generator = SqlGenerator::new(
            Arc::clone(&backend),
            Arc::clone(&retriever),
            settings.search_k,
            database.dialect(),
        );
        let steps = StepExecutor::new(
            generator,
            SqlExecutor::new(Arc::clone(&database)),
            settings.max_rows,
            settings.sql_timeout_secs,
        );

        Self {
            planner,
            steps,
            backend,
            retriever,
            database,
            settings,
        }
    }

    /// Build the pipeline and all of its collaborators from configuration
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let database: Arc<dyn Database> = Arc::new(SqliteDatabase::open(&config.database.path)?);
        let backend = build_backend(&config.llm)?;
        let retriever = build_retriever(&config.retrieval, database.as_ref())?;

        tracing::info!(
            backend = backend.name(),
            model = backend.model(),
            database = %config.database.path.display(),
            "Pipeline assembled"
        );

        Ok(Self::new(
            backend,
            retriever,
            database,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    /// Plan `user_request` into at most `max_steps` sub-tasks and run them.
    ///
    /// The returned results always form a prefix of the plan: execution
    /// stops at (and includes) the first failed step.
    pub async fn run(
        &self,
        user_request: &str,
        max_steps: usize,
        per_step_retries: u32,
    ) -> Result<Vec<StepResult>, PipelineError> {
        let start = Instant::now();
        tracing::info!(max_steps, per_step_retries, "Starting pipeline: {}", user_request);

        let plan = self.planner.plan(user_request, max_steps).await?;

        let mut results = Vec::with_capacity(plan.len());
        let mut prior_sql: Vec<String> = Vec::new();

        for (i, subtask) in plan.iter().enumerate() {
            let step_id = i + 1;
            let step = self
                .steps
                .run_step(step_id, subtask, &prior_sql, user_request, per_step_retries)
                .await
                .map_err(|source| PipelineError::Generation {
                    step: step_id,
                    source,
                })?;

            let succeeded = step.is_success();
            if succeeded {
                if let Some(sql) = &step.sql {
                    prior_sql.push(sql.clone());
                }
            }
            results.push(step);

            if !succeeded {
                tracing::warn!(
                    step = step_id,
                    remaining = plan.len() - step_id,
                    "Pipeline halted after failed step"
                );
                break;
            }
        }

        tracing::info!(
            steps = results.len(),
            successful = results.iter().filter(|r| r.is_success()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline finished"
        );

        Ok(results)
    }

    /// Run with the configured step and retry limits
    pub async fn run_default(&self, user_request: &str) -> Result<Vec<StepResult>, PipelineError> {
        self.run(
            user_request,
            self.settings.max_steps,
            self.settings.per_step_retries,
        )
        .await
    }

    /// Check every collaborator
    pub async fn health(&self) -> HealthReport {
        let backend = match self.backend.health_check().await {
            Ok(()) => ComponentHealth::ok(format!(
                "{} serving {}",
                self.backend.name(),
                self.backend.model()
            )),
            Err(e) => ComponentHealth::failed(e.to_string()),
        };

        let database = match self.database.list_tables() {
            Ok(tables) => ComponentHealth::ok(format!("{} tables", tables.len())),
            Err(e) => ComponentHealth::failed(e.to_string()),
        };

        let retrieval = match self.retriever.retrieve("schema", 1).await {
            Ok(snippets) if snippets.is_empty() => ComponentHealth::failed("no schema snippets"),
            Ok(_) => ComponentHealth::ok("index ready"),
            Err(e) => ComponentHealth::failed(e.to_string()),
        };

        HealthReport {
            backend,
            database,
            retrieval,
            retrieval_cache: self.retriever.cache_stats(),
        }
    }
}

/// The last successful step that produced a result table
pub fn select_final_result(results: &[StepResult]) -> Option<&StepResult> {
    results
        .iter()
        .rev()
        .find(|r| r.is_success() && r.result.is_some())
}

/// Per-step summary for reporting
pub fn summarize(results: &[StepResult]) -> Vec<ExecutionStep> {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| ExecutionStep {
            step: i + 1,
            success: result.error.is_none(),
            has_data: result.result.as_ref().is_some_and(|t| !t.is_empty()),
            error: result.error.clone(),
            sql_preview: result.sql.as_deref().map(sql_preview),
        })
        .collect()
}

fn sql_preview(sql: &str) -> String {
    if sql.chars().count() > SQL_PREVIEW_CHARS {
        let head: String = sql.chars().take(SQL_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        sql.to_string()
    }
}

fn build_backend(config: &LlmConfig) -> Result<Arc<dyn CompletionBackend>, LlmError> {
    let policy = config.retry_policy();
    let backend: Arc<dyn CompletionBackend> = match config.backend {
        BackendKind::Ollama => Arc::new(Retrying::new(
            OllamaClient::new(
                config.ollama_url.as_str(),
                config.model.as_str(),
                config.options.clone(),
                config.timeout(),
            )?,
            policy,
        )),
        BackendKind::Text => Arc::new(Retrying::new(
            TextCompletionClient::new(
                config.text_url.as_str(),
                config.model.as_str(),
                config.options.clone(),
                config.timeout(),
            )?,
            policy,
        )),
    };
    Ok(backend)
}

/// Index the configured schema documentation, or the database DDL when
/// none is available
fn build_retriever(
    config: &RetrievalConfig,
    database: &dyn Database,
) -> Result<Arc<dyn SchemaContextProvider>, BuildError> {
    let documents = match &config.schema_doc {
        Some(path) if path.exists() => load_documents(path)?,
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "Schema documentation not found, indexing database DDL instead"
            );
            database.schema_ddl()?
        }
        None => database.schema_ddl()?,
    };

    let index = LexicalIndex::from_documents(&documents, &config.splitter())?;
    tracing::info!(chunks = index.len(), "Schema index ready");

    Ok(Arc::new(CachedRetriever::new(
        index,
        config.cache_max_entries,
        Duration::from_secs(config.cache_ttl_secs),
    )))
}
