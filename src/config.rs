//! Environment-driven configuration.
//!
//! Every setting has a default; `SQLPILOT_*` variables override them.
//! Values that are present but unparseable are reported, not ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::llm::{RetryPolicy, SamplingOptions};
use crate::retrieval::TextSplitter;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Which wire convention the generation backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama `/api/chat` with structured messages
    Ollama,
    /// OpenAI-compatible `/v1/completions` with one combined prompt
    Text,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "text" => Ok(BackendKind::Text),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub model: String,
    pub ollama_url: String,
    pub text_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub options: SamplingOptions,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            model: "qwen2.5-coder:7b".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            text_url: "http://localhost:8080".to_string(),
            timeout_secs: 300,
            max_retries: 3,
            retry_delay_secs: 5,
            options: SamplingOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
    pub timeout_secs: u64,
    /// Row cap applied to statements without their own LIMIT
    pub max_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/database.db"),
            timeout_secs: 60,
            max_rows: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Schema documentation file or directory. Database DDL is used when absent.
    pub schema_doc: Option<PathBuf>,
    /// Snippets retrieved per query
    pub search_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,
}

impl RetrievalConfig {
    pub fn splitter(&self) -> TextSplitter {
        TextSplitter::new(self.chunk_size, self.chunk_overlap, self.separators.clone())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            schema_doc: None,
            search_k: 6,
            chunk_size: 800,
            chunk_overlap: 100,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
            cache_ttl_secs: 300,
            cache_max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound suggested to the planner
    pub max_steps: usize,
    /// Attempts per step
    pub per_step_retries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 4,
            per_step_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub retrieval: RetrievalConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Build configuration from environment variables
    /// SQLPILOT_DATABASE=data/database.db
    /// SQLPILOT_BACKEND=ollama
    /// SQLPILOT_MODEL=qwen2.5-coder:7b
    /// SQLPILOT_PORT=8000
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let env = Env { lookup: &lookup };

        let llm = LlmConfig {
            backend: env.parse("SQLPILOT_BACKEND", defaults.llm.backend)?,
            model: env.string("SQLPILOT_MODEL", defaults.llm.model),
            ollama_url: env.string("SQLPILOT_OLLAMA_URL", defaults.llm.ollama_url),
            text_url: env.string("SQLPILOT_TEXT_URL", defaults.llm.text_url),
            timeout_secs: env.parse("SQLPILOT_LLM_TIMEOUT_SECS", defaults.llm.timeout_secs)?,
            max_retries: env.parse("SQLPILOT_LLM_MAX_RETRIES", defaults.llm.max_retries)?,
            retry_delay_secs: env.parse(
                "SQLPILOT_LLM_RETRY_DELAY_SECS",
                defaults.llm.retry_delay_secs,
            )?,
            options: defaults.llm.options,
        };

        let database = DatabaseConfig {
            path: env
                .get("SQLPILOT_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.database.path),
            timeout_secs: env.parse("SQLPILOT_SQL_TIMEOUT_SECS", defaults.database.timeout_secs)?,
            max_rows: env.parse("SQLPILOT_MAX_ROWS", defaults.database.max_rows)?,
        };

        let retrieval = RetrievalConfig {
            schema_doc: env.get("SQLPILOT_SCHEMA_DOC").map(PathBuf::from),
            search_k: env.parse("SQLPILOT_SEARCH_K", defaults.retrieval.search_k)?,
            ..defaults.retrieval
        };

        let agent = AgentConfig {
            max_steps: env.parse("SQLPILOT_MAX_STEPS", defaults.agent.max_steps)?,
            per_step_retries: env.parse(
                "SQLPILOT_PER_STEP_RETRIES",
                defaults.agent.per_step_retries,
            )?,
        };

        let server = ServerConfig {
            host: env.string("SQLPILOT_HOST", defaults.server.host),
            port: env.parse("SQLPILOT_PORT", defaults.server.port)?,
        };

        Ok(Config {
            llm,
            database,
            retrieval,
            agent,
            server,
        })
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value for `key`
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.llm.backend, BackendKind::Ollama);
        assert_eq!(config.llm.model, "qwen2.5-coder:7b");
        assert_eq!(config.llm.timeout_secs, 300);
        assert_eq!(config.database.path, PathBuf::from("data/database.db"));
        assert_eq!(config.database.timeout_secs, 60);
        assert_eq!(config.database.max_rows, 500);
        assert_eq!(config.retrieval.schema_doc, None);
        assert_eq!(config.retrieval.search_k, 6);
        assert_eq!(config.retrieval.chunk_size, 800);
        assert_eq!(config.agent.max_steps, 4);
        assert_eq!(config.agent.per_step_retries, 2);
        assert_eq!(config.server.addr(), "127.0.0.1:8000");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("SQLPILOT_BACKEND", "Text"),
            ("SQLPILOT_DATABASE", "/tmp/x.db"),
            ("SQLPILOT_SCHEMA_DOC", "docs/schema.md"),
            ("SQLPILOT_MAX_ROWS", "50"),
            ("SQLPILOT_PER_STEP_RETRIES", "5"),
            ("SQLPILOT_PORT", "9000"),
            ("SQLPILOT_LLM_RETRY_DELAY_SECS", "1"),
        ])
        .unwrap();

        assert_eq!(config.llm.backend, BackendKind::Text);
        assert_eq!(config.database.path, PathBuf::from("/tmp/x.db"));
        assert_eq!(
            config.retrieval.schema_doc,
            Some(PathBuf::from("docs/schema.md"))
        );
        assert_eq!(config.database.max_rows, 50);
        assert_eq!(config.agent.per_step_retries, 5);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.retry_policy().delay, Duration::from_secs(1));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = from_pairs(&[("SQLPILOT_PORT", "  "), ("SQLPILOT_SCHEMA_DOC", "")]).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retrieval.schema_doc, None);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = from_pairs(&[("SQLPILOT_MAX_STEPS", "four")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SQLPILOT_MAX_STEPS".to_string(),
                value: "four".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_backend_is_reported() {
        let err = from_pairs(&[("SQLPILOT_BACKEND", "openai")]).unwrap_err();
        assert!(err.to_string().contains("SQLPILOT_BACKEND"));
    }
}
