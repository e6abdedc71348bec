//! Frame-range chunk of the source.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-open frame range `[start, end)` processed as one encoding unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position in the plan.
    pub index: usize,
    /// First frame (inclusive).
    pub start: u64,
    /// Last frame (exclusive).
    pub end: u64,
}

impl Chunk {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        Self { index, start, end }
    }

    /// Number of frames in the chunk.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable name used for chunk-indexed paths (`chunk_00003`).
    pub fn label(&self) -> String {
        format!("chunk_{:05}", self.index)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {} [{}, {})", self.index, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_zero_padded() {
        assert_eq!(Chunk::new(3, 900, 1200).label(), "chunk_00003");
        assert_eq!(Chunk::new(12345, 0, 1).label(), "chunk_12345");
    }

    #[test]
    fn len_is_half_open() {
        let chunk = Chunk::new(0, 600, 700);
        assert_eq!(chunk.len(), 100);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.to_string(), "chunk 0 [600, 700)");
    }
}
