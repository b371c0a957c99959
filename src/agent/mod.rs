//! Step planning and the self-correcting execution loop.
//!
//! A [`Pipeline`] plans a request into sub-tasks with [`TaskPlanner`], then
//! runs each through [`StepExecutor`], which generates SQL with
//! [`SqlGenerator`], checks it, executes it and regenerates on failure.

pub mod generator;
pub mod pipeline;
pub mod planner;
pub mod step;

pub use generator::{
    extract_sql, FailureKind, GenerationError, RegenerationHint, SqlGenerator,
    SYNTAX_FAILURE_MESSAGE,
};
pub use pipeline::{
    select_final_result, summarize, BuildError, ComponentHealth, ExecutionStep, HealthReport,
    Pipeline, PipelineError, PipelineSettings,
};
pub use planner::{parse_numbered_list, PlanningError, SubTask, TaskPlanner};
pub use step::{StepExecutor, StepResult, StepStatus};
