//! EncodeChunks step - extract, check and encode every chunk in order.
//!
//! For each chunk:
//! 1. Materialize the left and right views in a chunk-scoped temp folder
//! 2. Reject byte-identical views (the source is not stereoscopic)
//! 3. Encode both views into one MVC chunk and classify the encoder output
//!
//! The first failure stops the loop. The chunk's raw views are removed when
//! its workspace guard drops, whatever the outcome.

use std::fs;

use crate::extraction::check_views;
use crate::models::{AcceptedChunk, Chunk, ChunkEncodeResult};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, EncodeOutput, JobState, StepOutcome};
use crate::workspace::{remove_dir_with_retry, remove_file_with_retry};

/// Runs the per-chunk extract → integrity → encode sequence.
pub struct EncodeChunksStep;

impl EncodeChunksStep {
    pub fn new() -> Self {
        Self
    }

    fn process_chunk(&self, ctx: &Context, chunk: &Chunk) -> StepResult<AcceptedChunk> {
        let reporter = ctx.reporter();
        let workspace = ctx
            .work_dir
            .chunk_workspace(chunk)
            .map_err(|e| StepError::io_error(format!("creating workspace for {}", chunk.label()), e))?;

        let views = ctx
            .extractor
            .extract(&ctx.source, chunk, &workspace, &reporter)?;
        ctx.logger.info(&format!(
            "Extracted {} frames per eye at {}",
            views.frames,
            views.resolution()
        ));

        let digests = check_views(&views)?;
        ctx.logger
            .debug(&format!("left sha256 {} / right sha256 {}", digests.left, digests.right));

        let encoded_path = ctx.work_dir.encoded_path(chunk);
        let result = ctx
            .encoder
            .encode(&views, ctx.source.framerate, &encoded_path, &reporter)?;
        ctx.logger
            .info(&format!("Encoder verdict: {}", result.outcome_label()));

        match result {
            ChunkEncodeResult::Accepted(path) => {
                let bytes = fs::metadata(&path)
                    .map_err(|e| StepError::io_error(format!("reading {}", path.display()), e))?
                    .len();
                Ok(AcceptedChunk {
                    chunk: *chunk,
                    encoded_path: path,
                    bytes,
                    left_digest: digests.left,
                    right_digest: digests.right,
                })
            }
            ChunkEncodeResult::Rejected { reason, diagnostic } => {
                if let Err(e) = remove_file_with_retry(&encoded_path) {
                    ctx.logger.warn(&format!(
                        "Could not delete rejected chunk {}: {}",
                        encoded_path.display(),
                        e
                    ));
                }
                Err(StepError::rejected(chunk.index, reason, diagnostic))
            }
        }
    }
}

impl Default for EncodeChunksStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for EncodeChunksStep {
    fn name(&self) -> &str {
        "EncodeChunks"
    }

    fn description(&self) -> &str {
        "Extract, check and encode each chunk"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.source.path.exists() {
            return Err(StepError::invalid_input(format!(
                "Source file not found: {}",
                ctx.source.path.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let chunks = state.chunks().to_vec();
        if chunks.is_empty() {
            return Err(StepError::precondition_failed("No chunk plan"));
        }

        let total = chunks.len();
        state.encode = Some(EncodeOutput::default());

        for (i, chunk) in chunks.iter().enumerate() {
            if ctx.is_cancelled() {
                ctx.logger
                    .warn(&format!("Cancelled before {}", chunk.label()));
                return Err(StepError::Cancelled);
            }

            let accepted = {
                let _chunk_scope = ctx.logger.enter_chunk(chunk, total);
                let accepted = self.process_chunk(ctx, chunk)?;
                ctx.logger
                    .success(&format!("Accepted ({} bytes)", accepted.bytes));
                accepted
            };

            if let Some(encode) = state.encode.as_mut() {
                encode.accepted.push(accepted);
            }

            let percent = (((i + 1) as f64 / total as f64) * 100.0) as u32;
            ctx.logger.progress(percent);
            ctx.report_progress(
                self.name(),
                percent,
                &format!("Encoded {}/{} chunks", i + 1, total),
            );
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let accepted = state.accepted();
        if accepted.len() != state.chunks().len() {
            return Err(StepError::invalid_output(format!(
                "{} of {} chunks accepted",
                accepted.len(),
                state.chunks().len()
            )));
        }
        for record in accepted {
            if record.bytes == 0 || !record.encoded_path.exists() {
                return Err(StepError::invalid_output(format!(
                    "Encoded chunk missing or empty: {}",
                    record.encoded_path.display()
                )));
            }
        }
        Ok(())
    }

    fn rollback(&self, ctx: &Context, state: &JobState) {
        let encoded_dir = ctx.work_dir.encoded_dir();
        if let Err(e) = remove_dir_with_retry(&encoded_dir) {
            ctx.logger.warn(&format!(
                "Could not delete encoded chunks in {}: {}",
                encoded_dir.display(),
                e
            ));
            return;
        }
        if !state.accepted().is_empty() {
            ctx.logger.info(&format!(
                "Discarded {} accepted chunk(s)",
                state.accepted().len()
            ));
        }
    }
}
