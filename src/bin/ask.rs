//! Ask one question from the command line
//!
//! Usage:
//!   sqlpilot-ask "Show the 10 highest paid employees"
//!   sqlpilot-ask --max-steps 2 --retries 3 --show-steps "Average salary per department"
//!   sqlpilot-ask --health

use clap::Parser;

use sqlpilot::agent::{select_final_result, Pipeline};
use sqlpilot::config::Config;
use sqlpilot::logging;

/// Rows printed in the result preview
const PREVIEW_ROWS: usize = 10;

#[derive(Parser)]
#[command(name = "sqlpilot-ask")]
#[command(about = "Answer a natural-language question with stepwise SQL")]
struct Cli {
    /// Maximum planned steps (defaults to SQLPILOT_MAX_STEPS)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Attempts per step (defaults to SQLPILOT_PER_STEP_RETRIES)
    #[arg(long)]
    retries: Option<u32>,

    /// Print every step, not only the final result
    #[arg(long)]
    show_steps: bool,

    /// Only check that the backend, database and schema index are ready
    #[arg(long)]
    health: bool,

    /// The question
    #[arg(required_unless_present = "health", num_args = 1..)]
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init("sqlpilot=warn", logging::log_file_from_env().as_deref())?;

    let config = Config::from_env()?;
    let pipeline = Pipeline::from_config(&config)?;

    if cli.health {
        let report = pipeline.health().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.is_healthy() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let question = cli.question.join(" ");
    let max_steps = cli.max_steps.unwrap_or(config.agent.max_steps);
    let retries = cli.retries.unwrap_or(config.agent.per_step_retries);

    println!("Processing query: {}", question);
    println!("{}", "=".repeat(60));

    let results = pipeline.run(&question, max_steps, retries).await?;

    if cli.show_steps {
        for step in &results {
            println!("\n[STEP {}] {} ({:?})", step.step_id, step.title, step.status());
            if !step.description.is_empty() {
                println!("  {}", step.description);
            }
            if let Some(sql) = &step.sql {
                println!("  SQL: {}", sql);
            }
            if step.attempted_sql.len() > 1 {
                println!("  Attempts: {}", step.attempted_sql.len());
            }
            if let Some(error) = &step.error {
                println!("  Error: {}", error);
            }
        }
    }

    match select_final_result(&results) {
        Some(last) => {
            println!("\nFINAL RESULT:");
            println!("{}", "=".repeat(60));
            println!("SQL: {}", last.sql.as_deref().unwrap_or_default());
            println!("Rows: {}", last.row_count());
            if let Some(table) = &last.result {
                println!("\nData Preview:");
                println!("{}", table.render(PREVIEW_ROWS));
            }
            Ok(())
        }
        None => {
            println!("No successful results generated.");
            if let Some(error) = results.last().and_then(|r| r.error.as_deref()) {
                eprintln!("Last error: {}", error);
            }
            std::process::exit(1);
        }
    }
}
