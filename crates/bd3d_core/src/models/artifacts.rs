//! Artifacts produced between pipeline stages.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

/// Raw left/right frame sequences extracted for one chunk.
///
/// The files live inside the chunk's scoped workspace and disappear with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPair {
    pub chunk: Chunk,
    pub left: PathBuf,
    pub right: PathBuf,
    /// Width of each raw frame.
    pub frame_width: u32,
    /// Height of each raw frame.
    pub frame_height: u32,
    /// Number of frames actually present in each file.
    pub frames: u64,
}

impl ViewPair {
    /// Bytes per yuv420p frame.
    pub fn frame_bytes(&self) -> u64 {
        yuv420p_frame_bytes(self.frame_width, self.frame_height)
    }

    /// `WxH` string passed to the encoder as the input resolution.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.frame_width, self.frame_height)
    }
}

/// Size in bytes of one planar 4:2:0 frame.
pub fn yuv420p_frame_bytes(width: u32, height: u32) -> u64 {
    let luma = width as u64 * height as u64;
    luma + luma / 2
}

/// Reason an encoded chunk was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Encoder exited non-zero, timed out, or produced no output.
    NonZeroExit,
    /// Output lacked the 3D-mode confirmation.
    NotStereoMode,
    /// Output contained a warning or frame drop/duplication notice.
    QualityWarning,
}

impl RejectReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NonZeroExit => "NonZeroExit",
            Self::NotStereoMode => "NotStereoMode",
            Self::QualityWarning => "QualityWarning",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Verdict of the stereo encoder adapter for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEncodeResult {
    Accepted(PathBuf),
    Rejected {
        reason: RejectReason,
        diagnostic: String,
    },
}

impl ChunkEncodeResult {
    pub fn rejected(reason: RejectReason, diagnostic: impl Into<String>) -> Self {
        Self::Rejected {
            reason,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Short outcome label for the event log.
    pub fn outcome_label(&self) -> String {
        match self {
            Self::Accepted(_) => "Accepted".to_string(),
            Self::Rejected { reason, .. } => format!("Rejected({})", reason),
        }
    }
}

/// Record of a chunk that passed every per-chunk gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedChunk {
    pub chunk: Chunk,
    pub encoded_path: PathBuf,
    pub bytes: u64,
    pub left_digest: String,
    pub right_digest: String,
}

/// Concatenated elementary stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledStream {
    pub path: PathBuf,
    pub bytes: u64,
    pub chunk_count: usize,
}

/// NAL-level evidence gathered by the bitstream verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NalEvidence {
    /// Total NAL units found.
    pub nal_units: u64,
    /// Units of type 15 (subset sequence parameter set).
    pub subset_sps: u64,
    /// Units of type 20 (coded slice extension).
    pub slice_extension: u64,
    /// Bytes read from the stream.
    pub bytes_scanned: u64,
}

impl NalEvidence {
    /// Whether any dependent-view unit was seen.
    pub fn has_dependent_view(&self) -> bool {
        self.subset_sps > 0 || self.slice_extension > 0
    }
}

impl fmt::Display for NalEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} NAL units, {} subset SPS, {} slice extensions, {} bytes scanned",
            self.nal_units, self.subset_sps, self.slice_extension, self.bytes_scanned
        )
    }
}

/// Outcome of the bitstream check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "evidence", rename_all = "snake_case")]
pub enum VerificationVerdict {
    Confirmed(NalEvidence),
    NotConfirmed(NalEvidence),
}

impl VerificationVerdict {
    /// Build the verdict from scan evidence.
    pub fn from_evidence(evidence: NalEvidence) -> Self {
        if evidence.has_dependent_view() {
            Self::Confirmed(evidence)
        } else {
            Self::NotConfirmed(evidence)
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn evidence(&self) -> &NalEvidence {
        match self {
            Self::Confirmed(e) | Self::NotConfirmed(e) => e,
        }
    }
}
