//! Minimal HTTP client for a running sqlpilot server
//!
//! Usage:
//!   sqlpilot-client health
//!   sqlpilot-client schema
//!   sqlpilot-client query Show the five highest paid employees
//!
//! The server address comes from SQLPILOT_URL (default http://127.0.0.1:8000).

use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const PREVIEW_ROWS: usize = 5;

fn usage() -> ! {
    eprintln!("Usage: sqlpilot-client health|schema|query <question...>");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let base_url = std::env::var("SQLPILOT_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
        .trim_end_matches('/')
        .to_string();

    let client = Client::builder().timeout(Duration::from_secs(600)).build()?;

    let ok = match args.first().map(String::as_str) {
        Some("health") => health(&client, &base_url).await?,
        Some("schema") => schema(&client, &base_url).await?,
        Some("query") if args.len() > 1 => query(&client, &base_url, &args[1..].join(" ")).await?,
        _ => usage(),
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn health(client: &Client, base_url: &str) -> Result<bool, reqwest::Error> {
    let response = client.get(format!("{}/health", base_url)).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;

    if status.is_success() && body["status"] == "healthy" {
        println!("API server is healthy and ready");
        Ok(true)
    } else {
        println!("API server is unhealthy: {}", body["message"].as_str().unwrap_or("?"));
        if let Some(components) = body["components"].as_object() {
            for (name, component) in components {
                println!(
                    "  {}: {}",
                    name,
                    component["message"].as_str().unwrap_or("?")
                );
            }
        }
        Ok(false)
    }
}

async fn schema(client: &Client, base_url: &str) -> Result<bool, reqwest::Error> {
    let response = client.get(format!("{}/schema", base_url)).send().await?;
    if !response.status().is_success() {
        eprintln!("Schema request error: {}", response.text().await?);
        return Ok(false);
    }

    let body: Value = response.json().await?;
    let info = &body["database_info"];
    println!("Database has {} tables:", info["table_count"]);
    if let Some(tables) = info["tables"].as_array() {
        for table in tables {
            println!("  - {}", table.as_str().unwrap_or("?"));
        }
    }
    Ok(true)
}

async fn query(client: &Client, base_url: &str, question: &str) -> Result<bool, reqwest::Error> {
    println!("Processing query: {}", question);
    println!("{}", "-".repeat(50));

    let start = Instant::now();
    let response = client
        .post(format!("{}/query", base_url))
        .json(&json!({ "query": question }))
        .send()
        .await?;

    if !response.status().is_success() {
        eprintln!("API Error: {} - {}", response.status(), response.text().await?);
        return Ok(false);
    }

    let body: Value = response.json().await?;
    if body["success"] != true {
        println!("Query failed: {}", body["error"].as_str().unwrap_or("?"));
        return Ok(false);
    }

    println!("Generated SQL: {}", body["sql"].as_str().unwrap_or(""));
    println!("Rows returned: {}", body["row_count"]);

    if let Some(rows) = body["data"].as_array() {
        if !rows.is_empty() {
            println!("Data preview (first {} rows):", PREVIEW_ROWS);
            for (i, row) in rows.iter().take(PREVIEW_ROWS).enumerate() {
                println!("  {}. {}", i + 1, row);
            }
        }
    }

    let metadata = &body["metadata"];
    println!(
        "Execution: {}/{} steps successful in {:?}",
        metadata["successful_steps"],
        metadata["total_steps"],
        start.elapsed()
    );
    Ok(true)
}
