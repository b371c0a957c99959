//! Test doubles shared by unit tests across the crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::db::{Database, SqliteDatabase};
use crate::llm::{CompletionBackend, LlmError};
use crate::retrieval::{RetrievalError, SchemaContextProvider};

/// Backend that replays a fixed script of replies and records every call
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::from_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn from_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(system, user)` pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.lock().push((system.to_string(), user.to_string()));
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Request("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Retriever that always returns the same snippets, truncated to `k`
pub struct StaticRetriever {
    snippets: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new(snippets: Vec<&str>) -> Self {
        Self {
            snippets: snippets.into_iter().map(str::to_string).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SchemaContextProvider for StaticRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        self.queries.lock().push(query.to_string());
        Ok(self.snippets.iter().take(k).cloned().collect())
    }
}

/// In-memory database with a small employees/departments schema
pub fn employee_database() -> Arc<dyn Database> {
    let db = SqliteDatabase::open_in_memory().expect("open in-memory database");
    db.execute_batch(
        "CREATE TABLE departments (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE employees (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             salary REAL,
             department_id INTEGER REFERENCES departments(id)
         );
         INSERT INTO departments (id, name) VALUES (1, 'Engineering'), (2, 'Sales');
         INSERT INTO employees (id, name, salary, department_id) VALUES
             (1, 'Ada', 120000, 1),
             (2, 'Brian', 95000, 1),
             (3, 'Chloe', 70000, 2),
             (4, 'Dmitri', 65000, 2);",
    )
    .expect("seed employee database");
    Arc::new(db)
}
