//! Per-chunk view extraction and the identical-view integrity gate.

mod integrity;
mod views;

pub use integrity::{check_views, file_digest, ViewDigests};
pub use views::{eye_filter, fit_within, FfmpegViewExtractor, ViewExtractor};

use thiserror::Error;

/// Errors from extracting or checking a chunk's views.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Decoder failed, timed out, or produced unusable output.
    #[error("View extraction failed for chunk {chunk_index}: {message}")]
    Failed {
        chunk_index: usize,
        message: String,
        tool_output: String,
    },

    /// Left and right views are byte-identical.
    #[error("Chunk {chunk_index} has identical left and right views (sha256 {digest})")]
    Degenerate { chunk_index: usize, digest: String },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    pub fn failed(
        chunk_index: usize,
        message: impl Into<String>,
        tool_output: impl Into<String>,
    ) -> Self {
        ExtractionError::Failed {
            chunk_index,
            message: message.into(),
            tool_output: tool_output.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ExtractionError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for extraction operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;
