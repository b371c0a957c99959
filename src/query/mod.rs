//! SQL text handling: plausibility checks and statement preparation.

pub mod prepare;
pub mod validate;

pub use prepare::{clean_statement, has_limit_clause, normalize_text, prepare_statement};
pub use validate::is_plausible;
