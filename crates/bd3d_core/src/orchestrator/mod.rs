//! Pipeline orchestrator for coordinating job execution.
//!
//! This module provides the infrastructure for running the conversion as a
//! sequence of steps that validate, execute, and record their results. A
//! failing step stops the run and rolls back every step that already ran.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Plan          frame-range chunks over the source
//!     ├── Step: EncodeChunks  per chunk: extract → integrity → encode
//!     ├── Step: Assemble      ordered byte concatenation
//!     └── Step: Verify        dependent-view NAL scan
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bd3d_core::orchestrator::{create_standard_pipeline, Context, JobState};
//!
//! let pipeline = create_standard_pipeline();
//! let ctx = Context::new(source, settings, "movie_3d", work_dir, output, logger,
//!                        events, extractor, encoder);
//! let mut state = JobState::new("movie_3d");
//!
//! let result = pipeline.run(&ctx, &mut state)?;
//! println!("Completed: {:?}", result.steps_completed);
//! ```

mod errors;
mod pipeline;
mod runner;
mod step;
pub mod steps;
#[cfg(test)]
mod testing;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use runner::{describe_logs, JobRunner, PipelineOutcome, RunSummary};
pub use step::PipelineStep;
pub use steps::{AssembleStep, EncodeChunksStep, PlanStep, VerifyStep};
pub use types::{
    Context, EncodeOutput, FailureRecord, JobState, PlanOutput, ProgressCallback, StepOutcome,
};

/// Create a standard pipeline with all steps in the correct order.
///
/// 1. Plan - split the source into chunks
/// 2. EncodeChunks - extract, check and encode each chunk in order
/// 3. Assemble - concatenate accepted chunks into the output stream
/// 4. Verify - confirm the dependent view in the assembled stream
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(PlanStep::new())
        .with_step(EncodeChunksStep::new())
        .with_step(AssembleStep::new())
        .with_step(VerifyStep::new())
}
