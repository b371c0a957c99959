use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::llm::{prompts, CompletionBackend, LlmError};
use crate::retrieval::{schema_context, RetrievalError, SchemaContextProvider};

/// One planned unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub title: String,
    pub description: String,
}

impl SubTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Used when the planner reply contains no recognizable steps
    pub fn fallback() -> Self {
        Self::new(
            "Single-step query",
            "Directly produce the final answer in one query.",
        )
    }

    /// Sub-task text handed to SQL generation
    pub fn prompt_text(&self) -> String {
        format!("{} — {}", self.title, self.description)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    #[error("Schema retrieval failed during planning: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation backend failed during planning: {0}")]
    Backend(#[from] LlmError),
}

/// Decomposes a request into ordered sub-tasks
pub struct TaskPlanner {
    backend: Arc<dyn CompletionBackend>,
    retriever: Arc<dyn SchemaContextProvider>,
    search_k: usize,
}

impl TaskPlanner {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        retriever: Arc<dyn SchemaContextProvider>,
        search_k: usize,
    ) -> Self {
        Self {
            backend,
            retriever,
            search_k,
        }
    }

    /// Plan at most `max_steps` sub-tasks for `user_request`.
    ///
    /// Backend and retrieval failures propagate. Parsing never fails: a reply
    /// with no numbered lines becomes a single fallback step.
    pub async fn plan(
        &self,
        user_request: &str,
        max_steps: usize,
    ) -> Result<Vec<SubTask>, PlanningError> {
        let context = schema_context(self.retriever.as_ref(), user_request, self.search_k).await?;
        tracing::debug!(context_chars = context.len(), "Retrieved planning context");

        let user_prompt = prompts::planner_user(user_request, &context, max_steps);
        let reply = self
            .backend
            .complete(prompts::PLANNER_SYSTEM, &user_prompt)
            .await?;

        let mut steps = parse_numbered_list(&reply);
        if steps.is_empty() {
            tracing::warn!("No steps parsed from plan, using single-step fallback");
            steps.push(SubTask::fallback());
        }
        steps.truncate(max_steps);

        tracing::info!(steps = steps.len(), max_steps, "Planned sub-tasks");
        for (i, step) in steps.iter().enumerate() {
            tracing::debug!(step = i + 1, title = %step.title, "Planned step");
        }

        Ok(steps)
    }
}

fn ordinal_line() -> &'static Regex {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    ORDINAL.get_or_init(|| Regex::new(r"^\s*\d+\s*[.)]{1,2}\s*(.+)$").expect("valid ordinal regex"))
}

fn title_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\s+[—–]\s+|\s+-\s+|:\s+").expect("valid separator regex"))
}

/// Parse a `1) Title — description` style list.
///
/// Lines without an ordinal marker (`1)`, `1.`, `1).`) are skipped. The first
/// em-dash, spaced hyphen or `: ` splits title from description; either side
/// may be empty, but not both.
pub fn parse_numbered_list(text: &str) -> Vec<SubTask> {
    text.lines()
        .filter_map(|line| ordinal_line().captures(line))
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str().trim();
            let (title, description) = match title_separator().find(body) {
                Some(sep) => (&body[..sep.start()], &body[sep.end()..]),
                None => (body, ""),
            };
            let title = title.trim().trim_matches('*').trim();
            let description = description.trim();
            if title.is_empty() && description.is_empty() {
                return None;
            }
            Some(SubTask::new(title, description))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, StaticRetriever};

    #[test]
    fn test_parse_em_dash_list() {
        let steps = parse_numbered_list(
            "1) Get users — fetch all rows\n2) Filter by salary — apply salary > 50000",
        );
        assert_eq!(
            steps,
            vec![
                SubTask::new("Get users", "fetch all rows"),
                SubTask::new("Filter by salary", "apply salary > 50000"),
            ]
        );
    }

    #[test]
    fn test_parse_ordinal_variants_and_separators() {
        let text = "Here is the plan:\n\
                    1. Count orders: group by customer\n\
                    2). Rank customers - order by count\n\
                    3 ) Pick the top one\n\
                    Thanks!";
        let steps = parse_numbered_list(text);
        assert_eq!(
            steps,
            vec![
                SubTask::new("Count orders", "group by customer"),
                SubTask::new("Rank customers", "order by count"),
                SubTask::new("Pick the top one", ""),
            ]
        );
    }

    #[test]
    fn test_parse_first_separator_wins() {
        let steps = parse_numbered_list("1) Totals: sum amounts — per region");
        assert_eq!(steps, vec![SubTask::new("Totals", "sum amounts — per region")]);
    }

    #[test]
    fn test_parse_strips_markdown_bold() {
        let steps = parse_numbered_list("1. **Join tables** — employees with departments");
        assert_eq!(
            steps,
            vec![SubTask::new("Join tables", "employees with departments")]
        );
    }

    #[test]
    fn test_parse_keeps_untitled_step() {
        let steps = parse_numbered_list("1) : count rows per region\n2) **\n3) Rank regions");
        assert_eq!(
            steps,
            vec![
                SubTask::new("", "count rows per region"),
                SubTask::new("Rank regions", ""),
            ]
        );
    }

    #[test]
    fn test_parse_ignores_plain_lines() {
        assert!(parse_numbered_list("no numbered lines here\n- bullet").is_empty());
        assert!(parse_numbered_list("").is_empty());
    }

    #[test]
    fn test_prompt_text() {
        let task = SubTask::new("Get users", "fetch all rows");
        assert_eq!(task.prompt_text(), "Get users — fetch all rows");
    }

    fn planner(backend: Arc<ScriptedBackend>, retriever: Arc<StaticRetriever>) -> TaskPlanner {
        TaskPlanner::new(backend, retriever, 6)
    }

    #[tokio::test]
    async fn test_plan_truncates_to_max_steps() {
        let backend = Arc::new(ScriptedBackend::new(vec!["1) A — a\n2) B — b\n3) C — c"]));
        let retriever = Arc::new(StaticRetriever::new(vec!["employees(id)"]));

        let steps = planner(backend.clone(), retriever.clone())
            .plan("do things", 2)
            .await
            .unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].title, "B");
        assert_eq!(retriever.queries(), vec!["do things".to_string()]);

        let calls = backend.calls();
        assert_eq!(calls[0].0, prompts::PLANNER_SYSTEM);
        assert!(calls[0].1.contains("employees(id)"));
        assert!(calls[0].1.contains("under 2 steps"));
    }

    #[tokio::test]
    async fn test_plan_falls_back_to_single_step() {
        let backend = Arc::new(ScriptedBackend::new(vec!["I cannot plan this."]));
        let retriever = Arc::new(StaticRetriever::new(vec![]));

        let steps = planner(backend, retriever).plan("anything", 4).await.unwrap();
        assert_eq!(steps, vec![SubTask::fallback()]);
    }

    #[tokio::test]
    async fn test_plan_backend_failure_propagates() {
        let backend = Arc::new(ScriptedBackend::from_results(vec![Err(LlmError::Timeout(
            "slow".into(),
        ))]));
        let retriever = Arc::new(StaticRetriever::new(vec![]));

        let err = planner(backend, retriever).plan("anything", 4).await.unwrap_err();
        assert!(matches!(err, PlanningError::Backend(LlmError::Timeout(_))));
    }
}
