//! Coarse plausibility check for generated SQL.
//!
//! This is not a grammar check. It only rejects output that is empty,
//! whitespace, comments, or that the tokenizer cannot read at all, so an
//! execution attempt is not spent on it.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Returns true when the first statement of `sql` carries at least one real token
pub fn is_plausible(sql: &str) -> bool {
    let statements = match tokenize_statements(sql) {
        Some(statements) => statements,
        None => return false,
    };

    match statements.first() {
        Some(first) => first.iter().any(is_meaningful),
        None => false,
    }
}

/// Tokenize and split on statement terminators.
///
/// Returns `None` when the tokenizer rejects the input. An input with no
/// tokens at all yields zero statements.
fn tokenize_statements(sql: &str) -> Option<Vec<Vec<Token>>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;

    let mut statements = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token {
            Token::SemiColon => statements.push(std::mem::take(&mut current)),
            Token::EOF => break,
            other => current.push(other),
        }
    }

    if !current.is_empty() {
        statements.push(current);
    }

    Some(statements)
}

fn is_meaningful(token: &Token) -> bool {
    !matches!(token, Token::Whitespace(_) | Token::EOF | Token::SemiColon)
}
