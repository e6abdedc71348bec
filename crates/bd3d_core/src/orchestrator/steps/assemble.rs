//! Assemble step - concatenate accepted chunks into the final stream.

use crate::assembly::{assemble_stream, partial_path, remove_artifacts};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::workspace::remove_file_with_retry;

/// Writes the elementary stream and drops the per-chunk artifacts.
pub struct AssembleStep;

impl AssembleStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AssembleStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AssembleStep {
    fn name(&self) -> &str {
        "Assemble"
    }

    fn description(&self) -> &str {
        "Concatenate accepted chunks into one elementary stream"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.output_path.as_os_str().is_empty() {
            return Err(StepError::invalid_input("No output path"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let artifacts = state
            .encode
            .as_ref()
            .map(|e| e.encoded_paths())
            .unwrap_or_default();

        ctx.logger.info(&format!(
            "Concatenating {} chunk(s) into {}",
            artifacts.len(),
            ctx.output_path.display()
        ));

        let stream = assemble_stream(&artifacts, &ctx.output_path)?;

        let failed = remove_artifacts(&artifacts);
        if failed > 0 {
            ctx.logger
                .warn(&format!("{} encoded chunk(s) could not be deleted", failed));
        }

        ctx.logger.info(&format!(
            "Stream written: {} bytes from {} chunks",
            stream.bytes, stream.chunk_count
        ));
        state.assembly = Some(stream);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let Some(stream) = state.assembly.as_ref() else {
            return Err(StepError::invalid_output("Assembled stream not recorded"));
        };

        let expected: u64 = state.accepted().iter().map(|a| a.bytes).sum();
        if stream.bytes != expected {
            return Err(StepError::invalid_output(format!(
                "Stream has {} bytes, accepted chunks total {}",
                stream.bytes, expected
            )));
        }
        if !ctx.output_path.exists() {
            return Err(StepError::invalid_output(format!(
                "Stream missing at {}",
                ctx.output_path.display()
            )));
        }
        Ok(())
    }

    fn rollback(&self, ctx: &Context, _state: &JobState) {
        for path in [partial_path(&ctx.output_path), ctx.output_path.clone()] {
            if let Err(e) = remove_file_with_retry(&path) {
                ctx.logger
                    .warn(&format!("Could not delete {}: {}", path.display(), e));
            }
        }
    }
}
