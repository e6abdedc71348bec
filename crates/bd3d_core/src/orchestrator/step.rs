//! Pipeline step trait definition.
//!
//! All pipeline steps implement this trait, providing a consistent
//! interface for validation, execution and cleanup.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// Trait for pipeline steps.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - Check preconditions before execution
/// 2. `execute` - Perform the step's work
/// 3. `validate_output` - Verify the step produced valid output
///
/// If any later step fails, `rollback` is called on every step that
/// already executed, in reverse order.
///
/// # Example
///
/// ```ignore
/// struct AssembleStep;
///
/// impl PipelineStep for AssembleStep {
///     fn name(&self) -> &str { "Assemble" }
///
///     fn validate_input(&self, ctx: &Context) -> StepResult<()> {
///         Ok(())
///     }
///
///     fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
///         state.assembly = Some(assemble_stream(&paths, &ctx.output_path)?);
///         Ok(StepOutcome::Success)
///     }
///
///     fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
///         if state.assembly.is_none() {
///             return Err(StepError::invalid_output("Stream not recorded"));
///         }
///         Ok(())
///     }
///
///     fn rollback(&self, ctx: &Context, _state: &JobState) {
///         let _ = std::fs::remove_file(&ctx.output_path);
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Get the step name (for logging and error context).
    fn name(&self) -> &str;

    /// Validate inputs before execution.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Execute the step's main work.
    ///
    /// Should perform the step's processing and record results in `state`.
    /// Use `ctx.logger` for logging and `ctx.report_progress()` for progress.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Validate outputs after execution.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Undo the step's side effects after the run failed.
    ///
    /// Must not fail; problems are logged. Default does nothing.
    fn rollback(&self, _ctx: &Context, _state: &JobState) {}

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
