//! Stereo encoding of extracted view pairs and classification of the
//! encoder's output.

mod classify;
mod x264;

pub use classify::{classify, ClassificationMarkers};
pub use x264::{EncodingParameters, StereoEncoder, X264StereoEncoder};

use thiserror::Error;

/// Filesystem failures around an encoder run. A tool that fails to start
/// is a rejected chunk, not an error.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl EncodingError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        EncodingError::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for encoding operations.
pub type EncodingResult<T> = Result<T, EncodingError>;
