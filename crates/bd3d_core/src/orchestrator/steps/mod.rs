//! Pipeline step implementations.
//!
//! Each step handles a specific phase of the stereo encoding pipeline.

mod assemble;
mod encode_chunks;
mod plan;
mod verify;

pub use assemble::AssembleStep;
pub use encode_chunks::EncodeChunksStep;
pub use plan::PlanStep;
pub use verify::VerifyStep;
