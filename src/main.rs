//! SQL Pilot Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SQLPILOT_HOST: Bind address (default: 127.0.0.1)
//! - SQLPILOT_PORT: Port number (default: 8000)
//! - SQLPILOT_DATABASE: SQLite database file (default: data/database.db)
//! - SQLPILOT_SCHEMA_DOC: Schema documentation file or directory (default: database DDL)
//! - SQLPILOT_BACKEND: `ollama` or `text` (default: ollama)
//! - SQLPILOT_MODEL: Model name (default: qwen2.5-coder:7b)
//! - SQLPILOT_MAX_STEPS / SQLPILOT_PER_STEP_RETRIES: Agent limits (default: 4 / 2)
//! - SQLPILOT_LOG_FILE: Also append logs to this file
//! - RUST_LOG: Log level (default: info)

use std::sync::Arc;

use sqlpilot::agent::Pipeline;
use sqlpilot::api::run_server;
use sqlpilot::config::Config;
use sqlpilot::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = logging::log_file_from_env();
    logging::init(logging::DEFAULT_FILTER, log_file.as_deref())?;

    let config = Config::from_env()?;

    tracing::info!("SQL Pilot configuration:");
    tracing::info!("  Listen: {}", config.server.addr());
    tracing::info!("  Database: {}", config.database.path.display());
    tracing::info!(
        "  Backend: {:?} ({})",
        config.llm.backend,
        config.llm.model
    );
    match &config.retrieval.schema_doc {
        Some(path) => tracing::info!("  Schema docs: {}", path.display()),
        None => tracing::info!("  Schema docs: database DDL"),
    }
    tracing::info!(
        "  Limits: {} steps, {} attempts per step, {} rows, {}s per statement",
        config.agent.max_steps,
        config.agent.per_step_retries,
        config.database.max_rows,
        config.database.timeout_secs
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    println!(
        r#"
   ____   ___  _       ____  _ _       _
  / ___| / _ \| |     |  _ \(_) | ___ | |_
  \___ \| | | | |     | |_) | | |/ _ \| __|
   ___) | |_| | |___  |  __/| | | (_) | |_
  |____/ \__\_\_____| |_|   |_|_|\___/ \__|

 Natural-language questions, stepwise SQL
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    let report = pipeline.health().await;
    if report.is_healthy() {
        tracing::info!("All components healthy");
    } else {
        // Keep serving; /health reports the failing component
        tracing::warn!(
            backend = %report.backend.message,
            database = %report.database.message,
            retrieval = %report.retrieval.message,
            "Start-up health check failed"
        );
    }

    run_server(&config.server, pipeline).await
}
