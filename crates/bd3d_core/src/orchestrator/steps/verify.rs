//! Verify step - confirm the dependent view at the bitstream level.
//!
//! Encoder output classification only looks at text; this step looks at
//! the bytes of the assembled stream.

use crate::assembly::verify_stream;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Scans the assembled stream for MVC NAL unit types.
pub struct VerifyStep;

impl VerifyStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VerifyStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for VerifyStep {
    fn name(&self) -> &str {
        "Verify"
    }

    fn description(&self) -> &str {
        "Scan the stream for dependent-view NAL units"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.output_path.exists() {
            return Err(StepError::precondition_failed(format!(
                "No stream to verify at {}",
                ctx.output_path.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let verdict = verify_stream(&ctx.output_path)?;
        let evidence = *verdict.evidence();
        ctx.logger.info(&evidence.to_string());

        state.verification = Some(verdict);

        if !verdict.is_confirmed() {
            ctx.logger
                .error("No subset SPS or slice extension NAL units: the stream is 2D only");
            return Err(StepError::NotConfirmed { evidence });
        }

        ctx.logger.success("Dependent view confirmed");
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match state.verification {
            Some(v) if v.is_confirmed() => Ok(()),
            _ => Err(StepError::invalid_output("Stream not confirmed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::{mvc_chunk, test_context};
    use std::fs;

    fn write_stream(ctx: &Context, bytes: &[u8]) {
        fs::create_dir_all(ctx.output_path.parent().unwrap()).unwrap();
        fs::write(&ctx.output_path, bytes).unwrap();
    }

    #[test]
    fn confirms_mvc_stream() {
        let (_dir, ctx) = test_context();
        write_stream(&ctx, &mvc_chunk(0));
        let mut state = JobState::new("job");
        let step = VerifyStep::new();

        step.validate_input(&ctx).unwrap();
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let evidence = state.verification.unwrap();
        assert_eq!(evidence.evidence().subset_sps, 1);
        assert_eq!(evidence.evidence().slice_extension, 1);
    }

    #[test]
    fn base_only_stream_is_not_confirmed() {
        let (_dir, ctx) = test_context();
        write_stream(&ctx, &[0, 0, 0, 1, 0x67, 0x64, 0, 0, 1, 0x65, 0x88]);
        let mut state = JobState::new("job");

        let err = VerifyStep::new().execute(&ctx, &mut state).unwrap_err();
        assert_eq!(err.kind(), "NotConfirmed");
        assert!(!state.verification.unwrap().is_confirmed());
    }

    #[test]
    fn missing_stream_fails_precondition() {
        let (_dir, ctx) = test_context();
        assert!(VerifyStep::new().validate_input(&ctx).is_err());
    }
}
