//! SQL Pilot: natural-language questions answered with stepwise SQL
//!
//! A question is planned into ordered sub-tasks. Each sub-task gets one SQL
//! statement, generated with retrieved schema context and the SQL of the
//! steps before it. Statements are checked, executed with a row cap and a
//! deadline, and regenerated from the error text when they fail.
//!
//! # Features
//!
//! - **Task planning**: numbered-list plans parsed from a generation backend
//! - **Self-correcting steps**: syntax and engine failures feed regeneration
//! - **Fail-fast runs**: a run stops at the first step that exhausts its budget
//! - **Bounded execution**: row cap via an outer LIMIT, per-statement deadline
//! - **Schema retrieval**: BM25 over schema docs or database DDL, TTL cached
//! - **Backends**: Ollama chat and OpenAI-compatible text completion
//!
//! # Example
//!
//! ```no_run
//! use sqlpilot::agent::{select_final_result, Pipeline};
//! use sqlpilot::config::Config;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let pipeline = Pipeline::from_config(&config)?;
//!
//! let results = pipeline.run_default("Which department has the highest payroll?").await?;
//! if let Some(last) = select_final_result(&results) {
//!     println!("{}", last.sql.as_deref().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod data;
pub mod db;
pub mod llm;
pub mod logging;
pub mod query;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use agent::{Pipeline, PipelineError, StepResult, SubTask};
pub use config::{Config, ConfigError};
pub use data::{ResultTable, Value};
pub use db::{Database, SqliteDatabase};
pub use llm::{CompletionBackend, LlmError};
pub use retrieval::SchemaContextProvider;
