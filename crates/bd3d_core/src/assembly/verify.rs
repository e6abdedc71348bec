//! Bitstream-level confirmation of the dependent view.
//!
//! Scans an Annex-B H.264 stream for NAL unit types that only appear in
//! MVC streams: 15 (subset sequence parameter set) and 20 (coded slice
//! extension). Their absence means the stream holds a base view only.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{AssemblyError, AssemblyResult};
use crate::models::{NalEvidence, VerificationVerdict};

/// NAL unit type of a subset sequence parameter set.
pub const NAL_SUBSET_SPS: u8 = 15;

/// NAL unit type of a coded slice extension (dependent view slice).
pub const NAL_SLICE_EXTENSION: u8 = 20;

const READ_BUFFER: usize = 1 << 20;

/// Incremental start-code scanner.
///
/// State carries across `feed` calls, so start codes split between two
/// buffers are still found.
#[derive(Debug, Default)]
pub struct NalScanner {
    zeros: u8,
    header_next: bool,
    evidence: NalEvidence,
}

impl NalScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the next slice of the stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.evidence.bytes_scanned += bytes.len() as u64;

        for &byte in bytes {
            if self.header_next {
                self.header_next = false;
                self.record_header(byte);
                self.zeros = u8::from(byte == 0);
                continue;
            }

            match byte {
                0 => self.zeros = self.zeros.saturating_add(1),
                1 if self.zeros >= 2 => {
                    self.header_next = true;
                    self.zeros = 0;
                }
                _ => self.zeros = 0,
            }
        }
    }

    fn record_header(&mut self, header: u8) {
        self.evidence.nal_units += 1;
        match header & 0x1F {
            NAL_SUBSET_SPS => self.evidence.subset_sps += 1,
            NAL_SLICE_EXTENSION => self.evidence.slice_extension += 1,
            _ => {}
        }
    }

    pub fn evidence(&self) -> NalEvidence {
        self.evidence
    }
}

/// Scan a stream file and decide whether it carries a dependent view.
pub fn verify_stream(path: &Path) -> AssemblyResult<VerificationVerdict> {
    let file = File::open(path)
        .map_err(|e| AssemblyError::io(format!("opening {}", path.display()), e))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER, file);
    let mut buf = vec![0u8; READ_BUFFER];
    let mut scanner = NalScanner::new();

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| AssemblyError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        scanner.feed(&buf[..n]);
    }

    let evidence = scanner.evidence();
    tracing::debug!(path = %path.display(), "{}", evidence);
    Ok(VerificationVerdict::from_evidence(evidence))
}
