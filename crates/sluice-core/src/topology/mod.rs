//! Shared orchestration primitives for multi-component runs.

mod pipeline;
mod retry;

pub use pipeline::{
    Pipeline, PipelineContext, PipelineRunner, RunSummary, random_jitter, run_pipelines,
};
pub use retry::{RetryPolicy, StepError};
