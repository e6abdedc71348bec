//! BD3D Core - Backend logic for the side-by-side to Blu-ray 3D encoder
//!
//! This crate contains the chunked stereo encoding pipeline with zero UI
//! dependencies. It can be driven by the bundled CLI or any other frontend.
//!
//! The pipeline plans frame-range chunks over the source, extracts the left
//! and right eye views of each chunk with ffmpeg, rejects chunks whose views
//! are identical, encodes each chunk with an MVC-capable encoder while
//! classifying the encoder's output, concatenates the accepted chunks into a
//! single elementary stream, and finally scans that stream for dependent-view
//! NAL units.

pub mod assembly;
pub mod chunking;
pub mod config;
pub mod encoding;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod process;
pub mod workspace;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
