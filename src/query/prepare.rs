use regex::Regex;
use std::sync::OnceLock;

/// Alias given to the bounded outer query
const CAP_ALIAS: &str = "limited_query";

fn limit_keyword() -> &'static Regex {
    static LIMIT: OnceLock<Regex> = OnceLock::new();
    LIMIT.get_or_init(|| Regex::new(r"(?i)\blimit\b").expect("valid limit regex"))
}

/// Strip surrounding whitespace and one trailing statement terminator
pub fn clean_statement(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Whether the statement already carries a row-limit clause
pub fn has_limit_clause(sql: &str) -> bool {
    limit_keyword().is_match(sql)
}

/// Prepare a statement for execution with a row cap.
///
/// Statements without a LIMIT are wrapped in a bounded outer query so the
/// inner statement is left untouched. An existing LIMIT is trusted as-is.
pub fn prepare_statement(sql: &str, max_rows: usize) -> String {
    let clean = clean_statement(sql);

    if has_limit_clause(clean) {
        clean.to_string()
    } else {
        format!(
            "SELECT * FROM ({}) AS {} LIMIT {}",
            clean, CAP_ALIAS, max_rows
        )
    }
}

/// Normalize free text for use as a cache key
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
