//! Data models for BD3D.
//!
//! This module contains the core data structures used throughout the pipeline:
//! - Source description (framerate, crop, split geometry)
//! - Frame-range chunks
//! - Per-chunk and per-run artifacts (views, encode results, verdicts)

mod artifacts;
mod chunk;
mod source;

pub use artifacts::{
    AcceptedChunk, AssembledStream, ChunkEncodeResult, NalEvidence, RejectReason,
    VerificationVerdict, ViewPair, yuv420p_frame_bytes,
};
pub use chunk::Chunk;
pub use source::{
    CropRect, Eye, EyeRegion, Framerate, ModelError, SourceDescriptor, SplitGeometry,
};
