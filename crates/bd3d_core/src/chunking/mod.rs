//! Chunk planning over the source frame range.
//!
//! Pure functions for splitting `[0, frame_count)` into ordered,
//! contiguous, non-overlapping encoding units.

use thiserror::Error;

use crate::models::Chunk;

/// Default number of frames per chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 300;

/// Errors raised by the planner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("frame count must be greater than zero")]
    EmptySource,

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Split the source into fixed-size chunks.
///
/// Every chunk holds `chunk_size` frames except possibly the last, which
/// holds the remainder. The union of all chunks is exactly
/// `[0, frame_count)`.
///
/// Pure function - no I/O, deterministic output.
pub fn plan_chunks(frame_count: u64, chunk_size: u64) -> Result<Vec<Chunk>, PlanError> {
    if frame_count == 0 {
        return Err(PlanError::EmptySource);
    }
    if chunk_size == 0 {
        return Err(PlanError::ZeroChunkSize);
    }

    let count = frame_count.div_ceil(chunk_size);
    let chunks = (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = start.saturating_add(chunk_size).min(frame_count);
            Chunk::new(i as usize, start, end)
        })
        .collect();

    Ok(chunks)
}

/// Total frames covered by a plan.
pub fn planned_frames(chunks: &[Chunk]) -> u64 {
    chunks.iter().map(Chunk::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(chunks: &[Chunk], frame_count: u64) {
        assert_eq!(chunks.first().map(|c| c.start), Some(0));
        assert_eq!(chunks.last().map(|c| c.end), Some(frame_count));
        for (i, pair) in chunks.windows(2).enumerate() {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap after chunk {}", i);
        }
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(!chunk.is_empty());
        }
        assert_eq!(planned_frames(chunks), frame_count);
    }

    #[test]
    fn splits_with_short_last_chunk() {
        let chunks = plan_chunks(700, 300).unwrap();
        assert_eq!(
            chunks,
            vec![
                Chunk::new(0, 0, 300),
                Chunk::new(1, 300, 600),
                Chunk::new(2, 600, 700),
            ]
        );
    }

    #[test]
    fn exact_multiple_has_no_remainder_chunk() {
        let chunks = plan_chunks(900, 300).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 300));
    }

    #[test]
    fn source_shorter_than_chunk_gives_one_chunk() {
        let chunks = plan_chunks(42, 300).unwrap();
        assert_eq!(chunks, vec![Chunk::new(0, 0, 42)]);
    }

    #[test]
    fn coverage_holds_across_sizes() {
        for frame_count in [1u64, 2, 299, 300, 301, 1000, 12_345] {
            for chunk_size in [1u64, 7, 300, 5000] {
                let chunks = plan_chunks(frame_count, chunk_size).unwrap();
                assert_covers(&chunks, frame_count);
                assert!(chunks
                    .iter()
                    .take(chunks.len() - 1)
                    .all(|c| c.len() == chunk_size));
            }
        }
    }

    #[test]
    fn huge_chunk_size_does_not_overflow() {
        let chunks = plan_chunks(u64::MAX, u64::MAX - 1).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], Chunk::new(1, u64::MAX - 1, u64::MAX));
        assert_covers(&chunks, u64::MAX);
    }

    #[test]
    fn rejects_zero_inputs() {
        assert_eq!(plan_chunks(0, 300), Err(PlanError::EmptySource));
        assert_eq!(plan_chunks(100, 0), Err(PlanError::ZeroChunkSize));
    }
}
