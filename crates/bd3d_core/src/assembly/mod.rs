//! Stream assembly and bitstream verification.

mod concat;
mod verify;

pub use concat::{assemble_stream, partial_path, remove_artifacts};
pub use verify::{verify_stream, NalScanner, NAL_SLICE_EXTENSION, NAL_SUBSET_SPS};

use thiserror::Error;

/// Errors from assembling or scanning the elementary stream.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No accepted chunks to assemble")]
    EmptyStream,

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for assembly operations.
pub type AssemblyResult<T> = Result<T, AssemblyError>;
