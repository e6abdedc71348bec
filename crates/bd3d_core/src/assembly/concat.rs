//! Byte-level concatenation of accepted chunks.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{AssemblyError, AssemblyResult};
use crate::models::AssembledStream;
use crate::workspace::remove_file_with_retry;

/// Concatenate `artifacts` in order into `output`.
///
/// The stream is written to `<output>.partial` and renamed into place only
/// when every chunk has been copied, so a failed run never leaves a
/// half-written stream at `output`.
pub fn assemble_stream(artifacts: &[PathBuf], output: &Path) -> AssemblyResult<AssembledStream> {
    if artifacts.is_empty() {
        return Err(AssemblyError::EmptyStream);
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AssemblyError::io(format!("creating {}", parent.display()), e))?;
    }

    let partial = partial_path(output);
    let result = write_concatenation(artifacts, &partial);

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = remove_file_with_retry(&partial);
            return Err(e);
        }
    };

    fs::rename(&partial, output).map_err(|e| {
        let _ = remove_file_with_retry(&partial);
        AssemblyError::io(format!("renaming {} into place", partial.display()), e)
    })?;

    tracing::info!(
        "Assembled {} chunks into {} ({} bytes)",
        artifacts.len(),
        output.display(),
        bytes
    );

    Ok(AssembledStream {
        path: output.to_path_buf(),
        bytes,
        chunk_count: artifacts.len(),
    })
}

/// Delete per-chunk artifacts after they have been assembled.
///
/// Failures are logged and returned as a count; they never fail the run.
pub fn remove_artifacts(artifacts: &[PathBuf]) -> usize {
    let mut failed = 0;
    for path in artifacts {
        if let Err(e) = remove_file_with_retry(path) {
            tracing::warn!("Could not delete {}: {}", path.display(), e);
            failed += 1;
        }
    }
    failed
}

/// Staging path used while the stream is being written.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_concatenation(artifacts: &[PathBuf], target: &Path) -> AssemblyResult<u64> {
    let file = File::create(target)
        .map_err(|e| AssemblyError::io(format!("creating {}", target.display()), e))?;
    let mut writer = BufWriter::new(file);
    let mut total = 0u64;

    for path in artifacts {
        let mut reader = File::open(path)
            .map_err(|e| AssemblyError::io(format!("opening {}", path.display()), e))?;
        total += io::copy(&mut reader, &mut writer)
            .map_err(|e| AssemblyError::io(format!("copying {}", path.display()), e))?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| AssemblyError::io("flushing stream", e.into_error()))?;
    file.sync_all()
        .map_err(|e| AssemblyError::io("syncing stream", e))?;

    Ok(total)
}
