//! Plan step - splits the source into frame-range chunks.

use crate::chunking::{plan_chunks, planned_frames};
use crate::config::validate;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, PlanOutput, StepOutcome};

/// Validates the source description and records the chunk plan.
pub struct PlanStep;

impl PlanStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlanStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PlanStep {
    fn name(&self) -> &str {
        "Plan"
    }

    fn description(&self) -> &str {
        "Split the source into frame-range chunks"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        validate(&ctx.settings).map_err(|e| StepError::invalid_input(e.to_string()))?;
        ctx.source.validate()?;
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let source = &ctx.source;
        let chunk_size = ctx.settings.chunking.chunk_size;

        ctx.logger.info(&format!(
            "Source: {} ({} frames @ {} fps, {}x{}, {})",
            source.path.display(),
            source.frame_count,
            source.framerate,
            source.frame_width,
            source.frame_height,
            source.geometry
        ));
        ctx.logger.info(&format!("Active area: {}", source.crop));

        let chunks = plan_chunks(source.frame_count, chunk_size)?;

        ctx.logger.info(&format!(
            "Planned {} chunks of up to {} frames",
            chunks.len(),
            chunk_size
        ));
        for chunk in &chunks {
            ctx.logger.debug(&format!("  {}", chunk));
        }

        state.plan = Some(PlanOutput { chunk_size, chunks });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let chunks = state.chunks();
        if chunks.is_empty() {
            return Err(StepError::invalid_output("Plan has no chunks"));
        }
        if planned_frames(chunks) != ctx.source.frame_count {
            return Err(StepError::invalid_output(format!(
                "Plan covers {} frames, source has {}",
                planned_frames(chunks),
                ctx.source.frame_count
            )));
        }
        Ok(())
    }
}
