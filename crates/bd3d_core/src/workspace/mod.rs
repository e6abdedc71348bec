//! Job work directory and chunk-scoped temp storage.
//!
//! Layout under the job work directory:
//!
//! ```text
//! <work_dir>/chunk_00000/left.yuv     raw views, removed with the guard
//! <work_dir>/chunk_00000/right.yuv
//! <work_dir>/encoded/chunk_00000.264  accepted encoded chunks
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::models::{Chunk, Eye};

/// Attempts made when deleting temp artifacts.
const CLEANUP_ATTEMPTS: u32 = 3;

/// Pause between deletion attempts (tools may still hold the file).
const CLEANUP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Per-job working directory.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create the work directory with an empty `encoded` folder.
    ///
    /// Encoded chunks left by an earlier aborted run are discarded.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let encoded = root.join("encoded");
        if encoded.exists() {
            remove_dir_with_retry(&encoded)?;
        }
        fs::create_dir_all(&encoded)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding accepted encoded chunks.
    pub fn encoded_dir(&self) -> PathBuf {
        self.root.join("encoded")
    }

    /// Chunk-indexed path of an encoded chunk.
    pub fn encoded_path(&self, chunk: &Chunk) -> PathBuf {
        self.encoded_dir().join(format!("{}.264", chunk.label()))
    }

    /// Create the scoped temp folder for one chunk.
    ///
    /// A leftover folder from an earlier aborted run is replaced.
    pub fn chunk_workspace(&self, chunk: &Chunk) -> io::Result<ChunkWorkspace> {
        let dir = self.root.join(chunk.label());
        if dir.exists() {
            remove_dir_with_retry(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(ChunkWorkspace {
            dir,
            chunk_index: chunk.index,
        })
    }

    /// Remove the whole work directory.
    pub fn remove(&self) -> io::Result<()> {
        if self.root.exists() {
            remove_dir_with_retry(&self.root)?;
        }
        Ok(())
    }
}

/// Temp folder for one chunk's raw views.
///
/// Removed when dropped, on success, rejection, error or unwinding alike.
#[derive(Debug)]
pub struct ChunkWorkspace {
    dir: PathBuf,
    chunk_index: usize,
}

impl ChunkWorkspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Raw frame file for the given eye.
    pub fn view_path(&self, eye: Eye) -> PathBuf {
        self.dir.join(format!("{}.yuv", eye.name()))
    }
}

impl Drop for ChunkWorkspace {
    fn drop(&mut self) {
        if !self.dir.exists() {
            return;
        }
        if let Err(e) = remove_dir_with_retry(&self.dir) {
            tracing::warn!(
                chunk = self.chunk_index,
                "Could not remove chunk workspace {}: {}",
                self.dir.display(),
                e
            );
        }
    }
}

/// Delete a file, retrying briefly. A missing file counts as success.
pub fn remove_file_with_retry(path: &Path) -> io::Result<()> {
    retry(path, || fs::remove_file(path))
}

/// Delete a directory tree, retrying briefly. A missing tree counts as success.
pub fn remove_dir_with_retry(path: &Path) -> io::Result<()> {
    retry(path, || fs::remove_dir_all(path))
}

fn retry(path: &Path, mut op: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt >= CLEANUP_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::debug!(
                    "Delete of {} failed (attempt {}): {}",
                    path.display(),
                    attempt,
                    e
                );
                attempt += 1;
                thread::sleep(CLEANUP_RETRY_DELAY);
            }
        }
    }
}
