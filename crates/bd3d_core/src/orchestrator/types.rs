//! Core types for the orchestrator pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pipeline::CancelHandle;
use crate::config::Settings;
use crate::encoding::StereoEncoder;
use crate::extraction::ViewExtractor;
use crate::logging::{JobLogger, ToolEventLog, ToolReporter};
use crate::models::{AcceptedChunk, AssembledStream, Chunk, SourceDescriptor, VerificationVerdict};
use crate::workspace::WorkDir;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to pipeline steps.
///
/// Contains job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// Source being converted.
    pub source: SourceDescriptor,
    /// Application settings.
    pub settings: Settings,
    /// Job name/identifier.
    pub job_name: String,
    /// Job-specific working directory (under temp_root).
    pub work_dir: WorkDir,
    /// Final elementary stream path.
    pub output_path: PathBuf,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Tool invocation event log.
    pub events: Arc<ToolEventLog>,
    /// Decoder adapter.
    pub extractor: Arc<dyn ViewExtractor>,
    /// Stereo encoder adapter.
    pub encoder: Arc<dyn StereoEncoder>,
    cancel: Option<CancelHandle>,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a job.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: SourceDescriptor,
        settings: Settings,
        job_name: impl Into<String>,
        work_dir: WorkDir,
        output_path: PathBuf,
        logger: Arc<JobLogger>,
        events: Arc<ToolEventLog>,
        extractor: Arc<dyn ViewExtractor>,
        encoder: Arc<dyn StereoEncoder>,
    ) -> Self {
        Self {
            source,
            settings,
            job_name: job_name.into(),
            work_dir,
            output_path,
            logger,
            events,
            extractor,
            encoder,
            cancel: None,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Let steps observe cancellation between chunks.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Job log and event log pair for tool adapters.
    pub fn reporter(&self) -> ToolReporter<'_> {
        ToolReporter::new(&self.logger, &self.events)
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// This is the "write-once manifest" - steps can add new data but
/// should not overwrite existing values. Each step's output is stored
/// in its own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    /// When the job finished (either way).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Chunk plan (from Plan step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanOutput>,
    /// Accepted chunks (from EncodeChunks step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode: Option<EncodeOutput>,
    /// Concatenated stream (from Assemble step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<AssembledStream>,
    /// Bitstream verdict (from Verify step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationVerdict>,
    /// Why the run stopped, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Check if planning has been completed.
    pub fn has_plan(&self) -> bool {
        self.plan.is_some()
    }

    /// Planned chunks, empty before planning.
    pub fn chunks(&self) -> &[Chunk] {
        self.plan.as_ref().map(|p| p.chunks.as_slice()).unwrap_or(&[])
    }

    /// Accepted chunks so far, in order.
    pub fn accepted(&self) -> &[AcceptedChunk] {
        self.encode
            .as_ref()
            .map(|e| e.accepted.as_slice())
            .unwrap_or(&[])
    }

    /// Mark the end of the run.
    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Local::now().to_rfc3339());
    }

    /// Write the manifest as pretty JSON.
    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}

/// Output from the Plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutput {
    pub chunk_size: u64,
    pub chunks: Vec<Chunk>,
}

/// Output from the EncodeChunks step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodeOutput {
    /// Accepted chunks in chunk order.
    pub accepted: Vec<AcceptedChunk>,
}

impl EncodeOutput {
    /// Encoded paths in concatenation order.
    pub fn encoded_paths(&self) -> Vec<PathBuf> {
        self.accepted.iter().map(|a| a.encoded_path.clone()).collect()
    }

    /// Total frames across accepted chunks.
    pub fn frames(&self) -> u64 {
        self.accepted.iter().map(|a| a.chunk.len()).sum()
    }
}

/// Failure details kept in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stable failure reason name.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

/// Outcome of a step execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (not applicable for this job).
    Skipped(String),
}
