//! HTTP surface over the pipeline.

pub mod handlers;
pub mod server;

pub use handlers::{validate_question, ApiError, AppState};
pub use server::{build_router, run_server};
