//! Scripted tool doubles and context builders for orchestrator tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::types::Context;
use crate::config::Settings;
use crate::encoding::{EncodingResult, StereoEncoder};
use crate::extraction::{ExtractionError, ExtractionResult, ViewExtractor};
use crate::logging::{init_test_tracing, JobLogger, LogConfig, ToolEventLog, ToolReporter};
use crate::models::{
    Chunk, ChunkEncodeResult, Eye, Framerate, RejectReason, SourceDescriptor, SplitGeometry,
    ViewPair,
};
use crate::workspace::{ChunkWorkspace, WorkDir};

const VIEW_WIDTH: u32 = 4;
const VIEW_HEIGHT: u32 = 2;

/// Writes tiny raw views; identical views when `identical` is set.
pub struct ScriptedExtractor {
    pub identical: bool,
}

impl ViewExtractor for ScriptedExtractor {
    fn extract(
        &self,
        _source: &SourceDescriptor,
        chunk: &Chunk,
        workspace: &ChunkWorkspace,
        _reporter: &ToolReporter<'_>,
    ) -> ExtractionResult<ViewPair> {
        let frame = crate::models::yuv420p_frame_bytes(VIEW_WIDTH, VIEW_HEIGHT) as usize;
        let len = frame * chunk.len() as usize;
        let left = workspace.view_path(Eye::Left);
        let right = workspace.view_path(Eye::Right);

        fs::write(&left, vec![0x10; len]).map_err(|e| ExtractionError::io("writing left", e))?;
        let fill = if self.identical { 0x10 } else { 0x20 };
        fs::write(&right, vec![fill; len]).map_err(|e| ExtractionError::io("writing right", e))?;

        Ok(ViewPair {
            chunk: *chunk,
            left,
            right,
            frame_width: VIEW_WIDTH,
            frame_height: VIEW_HEIGHT,
            frames: chunk.len(),
        })
    }
}

/// Writes an MVC-looking chunk, or rejects the chunk named in `reject`.
pub struct ScriptedEncoder {
    pub reject: Option<(usize, RejectReason)>,
}

impl StereoEncoder for ScriptedEncoder {
    fn encode(
        &self,
        views: &ViewPair,
        _framerate: Framerate,
        output: &Path,
        _reporter: &ToolReporter<'_>,
    ) -> EncodingResult<ChunkEncodeResult> {
        if let Some((index, reason)) = self.reject {
            if index == views.chunk.index {
                return Ok(ChunkEncodeResult::rejected(reason, "scripted rejection"));
            }
        }
        fs::write(output, mvc_chunk(views.chunk.index as u8))
            .map_err(|e| crate::encoding::EncodingError::io("writing chunk", e))?;
        Ok(ChunkEncodeResult::Accepted(output.to_path_buf()))
    }
}

/// SPS, subset SPS, IDR slice and slice extension, tagged with `tag`.
pub fn mvc_chunk(tag: u8) -> Vec<u8> {
    vec![
        0, 0, 0, 1, 0x67, 0x64, 0, 0, 0, 1, 0x6F, tag, 0, 0, 1, 0x65, 0x88, 0, 0, 1, 0x14, 0x80,
    ]
}

/// Context over a 900-frame source with accepting tool doubles.
pub fn test_context() -> (TempDir, Context) {
    test_context_with(
        900,
        ScriptedExtractor { identical: false },
        ScriptedEncoder { reject: None },
    )
}

/// Context over `frames` frames with the given tool doubles.
pub fn test_context_with(
    frames: u64,
    extractor: impl ViewExtractor + 'static,
    encoder: impl StereoEncoder + 'static,
) -> (TempDir, Context) {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.mkv");
    fs::write(&source_path, b"sbs").unwrap();

    let mut settings = Settings::default();
    settings.chunking.chunk_size = 300;

    let logs = dir.path().join("logs");
    let logger = JobLogger::new("test_job", &logs, LogConfig::default(), None).unwrap();
    let events = ToolEventLog::open("test_job", &logs).unwrap();
    let work_dir = WorkDir::create(dir.path().join("work")).unwrap();

    let source = SourceDescriptor::new(
        source_path,
        frames,
        Framerate::new(24000, 1001).unwrap(),
        3840,
        1080,
        SplitGeometry::FullSbs,
    );

    let ctx = Context::new(
        source,
        settings,
        "test_job",
        work_dir,
        dir.path().join("out").join("test_job.264"),
        Arc::new(logger),
        Arc::new(events),
        Arc::new(extractor),
        Arc::new(encoder),
    );
    (dir, ctx)
}
