//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Chunk → Detail

use std::io;

use thiserror::Error;

use crate::assembly::AssemblyError;
use crate::chunking::PlanError;
use crate::encoding::EncodingError;
use crate::extraction::ExtractionError;
use crate::models::{ModelError, NalEvidence, RejectReason};

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Pipeline was cancelled.
    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },

    /// Failed to set up job (create directories, etc.).
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_name: impl Into<String>) -> Self {
        Self::Cancelled {
            job_name: job_name.into(),
        }
    }

    /// Stable name of the failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StepFailed { source, .. } => source.kind(),
            Self::Cancelled { .. } => "Cancelled",
            Self::SetupFailed { .. } => "IoError",
        }
    }

    /// The step error, if a step failed.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Name of the failed step, if any.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step_name, .. } => Some(step_name),
            _ => None,
        }
    }
}

/// Error from a pipeline step.
///
/// Every variant is fatal: the run stops at the first one.
#[derive(Error, Debug)]
pub enum StepError {
    /// Source description or settings are unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A step did not leave the state it promised.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// The decoder could not produce the chunk's views.
    #[error("Extraction failed for chunk {chunk_index}: {message}")]
    ExtractionFailed {
        chunk_index: usize,
        message: String,
        tool_output: String,
    },

    /// Left and right views of a chunk are byte-identical.
    #[error("Chunk {chunk_index} is not stereoscopic: left and right views are identical (sha256 {digest})")]
    DegenerateInput { chunk_index: usize, digest: String },

    /// The encoder's output for a chunk was rejected.
    #[error("Chunk {chunk_index} rejected ({reason}): {diagnostic}")]
    Rejected {
        chunk_index: usize,
        reason: RejectReason,
        diagnostic: String,
    },

    /// No accepted chunks reached the assembler.
    #[error("No accepted chunks to assemble")]
    EmptyStream,

    /// The assembled stream has no dependent-view NAL units.
    #[error("Assembled stream carries no dependent view ({evidence})")]
    NotConfirmed { evidence: NalEvidence },

    /// File or process I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Cancellation requested between chunks.
    #[error("Cancelled")]
    Cancelled,

    /// A precondition was not met.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a rejection error.
    pub fn rejected(chunk_index: usize, reason: RejectReason, diagnostic: impl Into<String>) -> Self {
        Self::Rejected {
            chunk_index,
            reason,
            diagnostic: diagnostic.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Stable name of the failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::InvalidOutput(_) => "InvalidOutput",
            Self::ExtractionFailed { .. } => "ExtractionFailed",
            Self::DegenerateInput { .. } => "DegenerateInput",
            Self::Rejected { reason, .. } => match reason {
                RejectReason::NonZeroExit => "Rejected(NonZeroExit)",
                RejectReason::NotStereoMode => "Rejected(NotStereoMode)",
                RejectReason::QualityWarning => "Rejected(QualityWarning)",
            },
            Self::EmptyStream => "EmptyStream",
            Self::NotConfirmed { .. } => "NotConfirmed",
            Self::IoError { .. } => "IoError",
            Self::Cancelled => "Cancelled",
            Self::PreconditionFailed(_) => "PreconditionFailed",
        }
    }

    /// Chunk the error belongs to, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::ExtractionFailed { chunk_index, .. }
            | Self::DegenerateInput { chunk_index, .. }
            | Self::Rejected { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }

    /// Captured tool output attached to the error, if any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::ExtractionFailed { tool_output, .. } if !tool_output.is_empty() => {
                Some(tool_output)
            }
            _ => None,
        }
    }
}

impl From<PlanError> for StepError {
    fn from(e: PlanError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<ModelError> for StepError {
    fn from(e: ModelError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<ExtractionError> for StepError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Failed {
                chunk_index,
                message,
                tool_output,
            } => Self::ExtractionFailed {
                chunk_index,
                message,
                tool_output,
            },
            ExtractionError::Degenerate {
                chunk_index,
                digest,
            } => Self::DegenerateInput {
                chunk_index,
                digest,
            },
            ExtractionError::Io { operation, source } => Self::IoError { operation, source },
        }
    }
}

impl From<EncodingError> for StepError {
    fn from(e: EncodingError) -> Self {
        match e {
            EncodingError::Io { operation, source } => Self::IoError { operation, source },
        }
    }
}

impl From<AssemblyError> for StepError {
    fn from(e: AssemblyError) -> Self {
        match e {
            AssemblyError::EmptyStream => Self::EmptyStream,
            AssemblyError::Io { operation, source } => Self::IoError { operation, source },
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::rejected(2, RejectReason::QualityWarning, "matched 'warning:'");
        let msg = err.to_string();
        assert!(msg.contains("Chunk 2"));
        assert!(msg.contains("QualityWarning"));
        assert_eq!(err.kind(), "Rejected(QualityWarning)");
        assert_eq!(err.chunk_index(), Some(2));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::EmptyStream;
        let pipeline_err = PipelineError::step_failed("movie_3d", "Assemble", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("movie_3d"));
        assert!(msg.contains("Assemble"));
        assert_eq!(pipeline_err.kind(), "EmptyStream");
        assert_eq!(pipeline_err.step_name(), Some("Assemble"));
    }

    #[test]
    fn extraction_errors_keep_chunk_and_output() {
        let err: StepError =
            ExtractionError::failed(5, "decoder produced no frames", "moov atom not found").into();
        assert_eq!(err.kind(), "ExtractionFailed");
        assert_eq!(err.chunk_index(), Some(5));
        assert_eq!(err.tool_output(), Some("moov atom not found"));

        let err: StepError = ExtractionError::Degenerate {
            chunk_index: 1,
            digest: "ab".into(),
        }
        .into();
        assert_eq!(err.kind(), "DegenerateInput");
    }

    #[test]
    fn plan_errors_are_invalid_input() {
        let err: StepError = PlanError::ZeroChunkSize.into();
        assert_eq!(err.kind(), "InvalidInput");
    }
}
