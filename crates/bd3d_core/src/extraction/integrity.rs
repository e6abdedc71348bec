//! Identical-view detection by SHA-256 digest.
//!
//! A source whose two halves carry the same picture would encode into a
//! "3D" stream with no depth. Exact byte equality is the only criterion.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::{ExtractionError, ExtractionResult};
use crate::models::ViewPair;

const READ_BUFFER: usize = 1 << 20;

/// Digests of both views of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDigests {
    pub left: String,
    pub right: String,
}

/// SHA-256 of a file as lowercase hex, read in streaming fashion.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(READ_BUFFER, File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Reject a view pair whose two files are byte-identical.
pub fn check_views(views: &ViewPair) -> ExtractionResult<ViewDigests> {
    let chunk_index = views.chunk.index;
    let digest_of = |path: &Path| {
        file_digest(path).map_err(|e| {
            ExtractionError::io(format!("hashing {}", path.display()), e)
        })
    };

    let left = digest_of(&views.left)?;
    let right = digest_of(&views.right)?;

    if left == right {
        return Err(ExtractionError::Degenerate {
            chunk_index,
            digest: left,
        });
    }

    Ok(ViewDigests { left, right })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use std::fs;
    use tempfile::tempdir;

    fn pair(dir: &Path, left: &[u8], right: &[u8]) -> ViewPair {
        let left_path = dir.join("left.yuv");
        let right_path = dir.join("right.yuv");
        fs::write(&left_path, left).unwrap();
        fs::write(&right_path, right).unwrap();
        ViewPair {
            chunk: Chunk::new(4, 1200, 1500),
            left: left_path,
            right: right_path,
            frame_width: 2,
            frame_height: 2,
            frames: 1,
        }
    }

    #[test]
    fn digest_matches_known_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_digest(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn identical_views_are_degenerate() {
        let dir = tempdir().unwrap();
        let views = pair(dir.path(), b"same-frame", b"same-frame");

        let err = check_views(&views).unwrap_err();
        assert!(matches!(err, ExtractionError::Degenerate { chunk_index: 4, .. }));
    }

    #[test]
    fn gate_is_symmetric() {
        let dir = tempdir().unwrap();
        let a = pair(dir.path(), b"left-eye", b"right-eye");
        let digests_ab = check_views(&a).unwrap();

        let swapped = ViewPair {
            left: a.right.clone(),
            right: a.left.clone(),
            ..a.clone()
        };
        let digests_ba = check_views(&swapped).unwrap();

        assert_eq!(digests_ab.left, digests_ba.right);
        assert_eq!(digests_ab.right, digests_ba.left);
    }

    #[test]
    fn single_byte_difference_passes() {
        let dir = tempdir().unwrap();
        let views = pair(dir.path(), &[0u8; 6], &[0, 0, 0, 0, 0, 1]);
        assert!(check_views(&views).is_ok());
    }

    #[test]
    fn missing_view_is_io_error() {
        let dir = tempdir().unwrap();
        let mut views = pair(dir.path(), b"a", b"b");
        views.right = dir.path().join("gone.yuv");
        assert!(matches!(check_views(&views), Err(ExtractionError::Io { .. })));
    }
}
