//! Prompt text for planning and SQL generation.

pub const PLANNER_SYSTEM: &str = "\
You are a precise data analysis planner.
Break the user's request into the smallest possible sequential SQL sub-tasks that can be executed one by one.
Give each sub-task a short title and a one-line description of its purpose.
Return a numbered list. Steps must not overlap; a step may build on the output of earlier steps.
If a sub-task needs a temporary result or CTE, say so briefly.";

pub const SQL_SYSTEM: &str = "\
You are a senior analytics engineer who writes correct SQL for the stated dialect.
You write SQL for one sub-task at a time, using the schema snippets and any prior step SQL you are given.
Rules:
- Prefer ANSI SQL; use vendor-specific features only when necessary.
- List columns explicitly instead of SELECT * where possible.
- Reuse prior step results only by restating them inline as CTEs in a WITH clause, with the minimal columns needed.
- Never invent tables or columns that do not appear in the schema snippets.
- Produce exactly one statement that is idempotent and safe to run.
Return ONLY the SQL, with no commentary.";

/// Marker used when no earlier step has succeeded yet
pub const NO_PRIOR_SQL: &str = "(none)";

pub fn planner_user(user_request: &str, schema_context: &str, max_steps: usize) -> String {
    format!(
        "User request:\n{user_request}\n\n\
         Schema context (selected excerpts):\n{schema_context}\n\n\
         Return a list like:\n\
         1) <title> — <what this step does>\n\
         2) ...\n\
         Keep it under {max_steps} steps if possible.\n"
    )
}

pub fn sql_user(dialect: &str, subtask: &str, schema_context: &str, prior_sql: &str) -> String {
    format!(
        "Database dialect: {dialect}\n\
         Current sub-task: {subtask}\n\n\
         Relevant schema snippets:\n{schema_context}\n\n\
         SQL from earlier steps that produced intermediate results (if any):\n{prior_sql}\n\n\
         Produce a single SQL statement that accomplishes ONLY this sub-task.\n\
         If you build on earlier results, restate them inline as CTEs.\n\
         Return only SQL.\n"
    )
}

/// Number prior statements as `-- Step i` blocks, or the `(none)` marker
pub fn format_prior_sql(prior_sql: &[String]) -> String {
    if prior_sql.is_empty() {
        return NO_PRIOR_SQL.to_string();
    }

    prior_sql
        .iter()
        .enumerate()
        .map(|(i, sql)| format!("-- Step {}\n{}", i + 1, sql))
        .collect::<Vec<_>>()
        .join("\n\n")
}
