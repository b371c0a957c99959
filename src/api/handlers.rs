use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agent::{select_final_result, summarize, ExecutionStep, HealthReport, Pipeline};
use crate::db::{ColumnInfo, Database, DbError};

/// Words that mark a question as a request for data
const ACTION_WORDS: [&str; 5] = ["show", "get", "find", "list", "count"];

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

// ============================================================================
// Service info
// ============================================================================

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "SQL Pilot API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health - Health check",
            "query": "POST /query - Process natural language query",
            "validate": "POST /query/validate - Validate query without execution",
            "schema": "GET /schema - Database schema information",
            "table": "GET /schema/:table - Columns of one table",
        }
    }))
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub version: &'static str,
    pub checked_at: String,
    pub components: HealthReport,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.pipeline.health().await;

    let (code, status, message) = if report.is_healthy() {
        (StatusCode::OK, "healthy", "SQL pilot is running".to_string())
    } else {
        tracing::warn!(?report, "Health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "unhealthy",
            "One or more components are unavailable".to_string(),
        )
    };

    (
        code,
        Json(HealthResponse {
            status,
            message,
            version: env!("CARGO_PKG_VERSION"),
            checked_at: chrono::Utc::now().to_rfc3339(),
            components: report,
        }),
    )
}

// ============================================================================
// Query
// ============================================================================

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub max_steps: Option<usize>,
    pub per_step_retries: Option<u32>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub query: String,
    pub sql: Option<String>,
    pub row_count: usize,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub error: Option<String>,
    pub metadata: QueryMetadata,
}

#[derive(Serialize)]
pub struct QueryMetadata {
    pub total_steps: usize,
    pub successful_steps: usize,
    pub execution_summary: Vec<ExecutionStep>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = request.query.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    let settings = state.pipeline.settings();
    let max_steps = request.max_steps.unwrap_or(settings.max_steps).max(1);
    let retries = request
        .per_step_retries
        .unwrap_or(settings.per_step_retries);

    tracing::info!(max_steps, retries, "Processing query: {}", question);

    let results = state
        .pipeline
        .run(question, max_steps, retries)
        .await
        .map_err(|e| ApiError::Internal(format!("Error processing query: {}", e)))?;

    let metadata = QueryMetadata {
        total_steps: results.len(),
        successful_steps: results.iter().filter(|r| r.is_success()).count(),
        execution_summary: summarize(&results),
    };

    let response = match select_final_result(&results) {
        Some(last) => {
            let data = last
                .result
                .as_ref()
                .map(|table| table.to_records())
                .unwrap_or_default();
            tracing::info!(rows = data.len(), "Query answered");
            QueryResponse {
                success: true,
                query: question.to_string(),
                sql: last.sql.clone(),
                row_count: data.len(),
                data,
                error: None,
                metadata,
            }
        }
        None => {
            tracing::warn!("Query produced no usable result: {}", question);
            QueryResponse {
                success: false,
                query: question.to_string(),
                sql: None,
                row_count: 0,
                data: Vec::new(),
                error: Some("No successful results generated".to_string()),
                metadata,
            }
        }
    };

    Ok(Json(response))
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Deserialize)]
pub struct ValidationRequest {
    pub query: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ValidationResponse {
    pub valid: bool,
    pub query: String,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// Cheap wording checks on a question, without running anything
pub fn validate_question(question: &str) -> ValidationResponse {
    let question = question.trim();
    if question.is_empty() {
        return ValidationResponse {
            valid: false,
            query: String::new(),
            message: "Query must not be empty".to_string(),
            suggestions: Vec::new(),
        };
    }

    let mut suggestions = Vec::new();
    if question.split_whitespace().count() < 3 {
        suggestions.push("Consider providing more details in your query".to_string());
    }

    let lowered = question.to_lowercase();
    if !question.contains('?') && !ACTION_WORDS.iter().any(|w| lowered.contains(w)) {
        suggestions.push(
            "Try starting with action words like 'show', 'get', 'find', or 'list'".to_string(),
        );
    }

    ValidationResponse {
        valid: true,
        query: question.to_string(),
        message: "Query appears to be valid natural language".to_string(),
        suggestions,
    }
}

pub async fn validate(Json(request): Json<ValidationRequest>) -> Json<ValidationResponse> {
    Json(validate_question(&request.query))
}

// ============================================================================
// Schema
// ============================================================================

#[derive(Serialize)]
pub struct SchemaResponse {
    pub success: bool,
    pub database_info: DatabaseInfo,
}

#[derive(Serialize)]
pub struct DatabaseInfo {
    pub dialect: &'static str,
    pub table_count: usize,
    pub tables: Vec<String>,
}

pub async fn schema(State(state): State<Arc<AppState>>) -> Result<Json<SchemaResponse>, ApiError> {
    let database = Arc::clone(state.pipeline.database());
    let dialect = database.dialect();
    let tables = with_database(database, |db| db.list_tables()).await?;

    Ok(Json(SchemaResponse {
        success: true,
        database_info: DatabaseInfo {
            dialect,
            table_count: tables.len(),
            tables,
        },
    }))
}

#[derive(Serialize)]
pub struct TableSchemaResponse {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

pub async fn table_schema(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Result<Json<TableSchemaResponse>, ApiError> {
    let database = Arc::clone(state.pipeline.database());
    let name = table.clone();
    let columns = with_database(database, move |db| db.table_columns(&name)).await?;

    Ok(Json(TableSchemaResponse { table, columns }))
}

/// Run a blocking database call off the async workers
async fn with_database<T, F>(database: Arc<dyn Database>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Database) -> Result<T, DbError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(database.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UnknownTable(table) => ApiError::NotFound(format!("Table '{}' not found", table)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!("{}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
