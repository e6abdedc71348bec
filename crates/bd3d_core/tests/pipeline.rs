//! End-to-end pipeline runs with scripted tool doubles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};

use bd3d_core::config::Settings;
use bd3d_core::encoding::{EncodingError, EncodingResult, StereoEncoder};
use bd3d_core::extraction::{ExtractionError, ExtractionResult, ViewExtractor};
use bd3d_core::logging::ToolReporter;
use bd3d_core::models::{
    yuv420p_frame_bytes, Chunk, ChunkEncodeResult, CropRect, Eye, Framerate,
    SourceDescriptor, SplitGeometry, ViewPair,
};
use bd3d_core::orchestrator::{JobRunner, JobState, PipelineOutcome};
use bd3d_core::workspace::ChunkWorkspace;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 4;

/// Observed chunk directories, so tests can check they were cleaned up.
type Seen = Arc<Mutex<Vec<PathBuf>>>;

struct FakeExtractor {
    identical: bool,
    seen: Seen,
}

impl ViewExtractor for FakeExtractor {
    fn extract(
        &self,
        _source: &SourceDescriptor,
        chunk: &Chunk,
        workspace: &ChunkWorkspace,
        _reporter: &ToolReporter<'_>,
    ) -> ExtractionResult<ViewPair> {
        self.seen.lock().push(workspace.dir().to_path_buf());

        let len = (yuv420p_frame_bytes(WIDTH, HEIGHT) * chunk.len()) as usize;
        let left = workspace.view_path(Eye::Left);
        let right = workspace.view_path(Eye::Right);
        fs::write(&left, vec![1u8; len]).map_err(|e| ExtractionError::io("left", e))?;
        let right_fill = if self.identical { 1u8 } else { 2u8 };
        fs::write(&right, vec![right_fill; len]).map_err(|e| ExtractionError::io("right", e))?;

        Ok(ViewPair {
            chunk: *chunk,
            left,
            right,
            frame_width: WIDTH,
            frame_height: HEIGHT,
            frames: chunk.len(),
        })
    }
}

/// Encoder double that produces one text transcript per chunk.
struct FakeEncoder {
    /// Chunk index whose transcript carries the given extra line.
    noisy_chunk: Option<(usize, &'static str)>,
    /// Write a base-view-only stream.
    base_only: bool,
    /// Report the 3D mode line.
    stereo: bool,
    encoded: Seen,
}

impl FakeEncoder {
    fn transcript(&self, chunk: usize) -> String {
        let mut out = String::new();
        if self.stereo {
            out.push_str("x264 [info]: 3D mode: MVC\n");
        }
        out.push_str("encoded 300 frames\n");
        if let Some((index, line)) = self.noisy_chunk {
            if index == chunk {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

impl StereoEncoder for FakeEncoder {
    fn encode(
        &self,
        views: &ViewPair,
        _framerate: Framerate,
        output: &Path,
        _reporter: &ToolReporter<'_>,
    ) -> EncodingResult<ChunkEncodeResult> {
        let bytes = if self.base_only {
            vec![0, 0, 0, 1, 0x67, 0x64, 0, 0, 1, 0x65, views.chunk.index as u8]
        } else {
            vec![
                0, 0, 0, 1, 0x67, 0x64, 0, 0, 0, 1, 0x6F, 0x01, 0, 0, 1, 0x65,
                views.chunk.index as u8, 0, 0, 1, 0x14, 0x80,
            ]
        };
        fs::write(output, bytes).map_err(|e| EncodingError::io("write", e))?;
        self.encoded.lock().push(output.to_path_buf());

        let transcript = self.transcript(views.chunk.index);
        let markers = bd3d_core::encoding::ClassificationMarkers::default();
        Ok(bd3d_core::encoding::classify(Some(0), &transcript, output, &markers))
    }
}

struct Harness {
    dir: TempDir,
    seen_chunks: Seen,
    encoded: Seen,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            seen_chunks: Arc::default(),
            encoded: Arc::default(),
        }
    }

    fn source(&self, frames: u64) -> SourceDescriptor {
        let path = self.dir.path().join("movie.mkv");
        fs::write(&path, b"sbs").unwrap();
        SourceDescriptor::new(
            path,
            frames,
            Framerate::parse("24000/1001").unwrap(),
            3840,
            1080,
            SplitGeometry::FullSbs,
        )
    }

    fn runner(&self, identical: bool, encoder: FakeEncoder) -> JobRunner {
        let root = self.dir.path();
        JobRunner::new(
            Settings::default(),
            root.join("logs"),
            root.join("temp"),
            root.join("out"),
        )
        .with_extractor(Arc::new(FakeExtractor {
            identical,
            seen: Arc::clone(&self.seen_chunks),
        }))
        .with_encoder(Arc::new(encoder))
    }

    fn encoder(&self, noisy_chunk: Option<(usize, &'static str)>, base_only: bool) -> FakeEncoder {
        FakeEncoder {
            noisy_chunk,
            base_only,
            stereo: true,
            encoded: Arc::clone(&self.encoded),
        }
    }

    fn run(&self, runner: &JobRunner, frames: u64) -> PipelineOutcome {
        runner.run("movie", self.source(frames), None, None, None)
    }

    fn assert_no_leftovers(&self, runner: &JobRunner) {
        for dir in self.seen_chunks.lock().iter() {
            assert!(!dir.exists(), "chunk workspace left behind: {}", dir.display());
        }
        for file in self.encoded.lock().iter() {
            assert!(!file.exists(), "encoded chunk left behind: {}", file.display());
        }
        assert!(!self.dir.path().join("temp").join("movie").exists());
        let output = runner.output_path_for("movie");
        assert!(!output.exists());
        assert!(!bd3d_core::assembly::partial_path(&output).exists());
    }
}

#[test]
fn warning_on_last_chunk_aborts_without_stream() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(Some((2, "x264 [warning]: WARNING: 1 dropped frame")), false));

    let outcome = h.run(&runner, 900);

    assert!(!outcome.success);
    assert!(outcome.stream.is_none());
    assert_eq!(outcome.failure_kind(), Some("Rejected(QualityWarning)"));
    assert_eq!(outcome.failure.as_ref().unwrap().chunk_index, Some(2));

    // All three chunks were attempted, none survive.
    assert_eq!(h.seen_chunks.lock().len(), 3);
    assert_eq!(h.encoded.lock().len(), 3);
    h.assert_no_leftovers(&runner);
}

#[test]
fn native_encoder_warning_aborts_run() {
    let h = Harness::new();
    let runner = h.runner(
        false,
        h.encoder(Some((1, "x264 [warning]: VBV underflow (frame 41, -1336 bits)")), false),
    );

    let outcome = h.run(&runner, 900);

    assert!(outcome.stream.is_none());
    assert_eq!(outcome.failure_kind(), Some("Rejected(QualityWarning)"));
    assert_eq!(outcome.failure.as_ref().unwrap().chunk_index, Some(1));
    h.assert_no_leftovers(&runner);
}

#[test]
fn clean_run_produces_confirmed_stream() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(None, false));

    let outcome = h.run(&runner, 700);

    assert!(outcome.success, "{:?}", outcome.error);
    assert!(outcome.confirmed);
    let stream = outcome.stream.clone().unwrap();
    assert_eq!(stream.chunk_count, 3);
    assert_eq!(fs::metadata(&stream.path).unwrap().len(), stream.bytes);

    let evidence = *outcome.verdict.unwrap().evidence();
    assert_eq!(evidence.subset_sps, 3);
    assert_eq!(evidence.slice_extension, 3);

    // Temp storage is gone, the stream stays.
    for dir in h.seen_chunks.lock().iter() {
        assert!(!dir.exists());
    }
    for file in h.encoded.lock().iter() {
        assert!(!file.exists());
    }

    let state: JobState =
        serde_json::from_str(&fs::read_to_string(outcome.state_path.unwrap()).unwrap()).unwrap();
    let frames: Vec<(u64, u64)> = state
        .accepted()
        .iter()
        .map(|a| (a.chunk.start, a.chunk.end))
        .collect();
    assert_eq!(frames, vec![(0, 300), (300, 600), (600, 700)]);
}

#[test]
fn identical_views_fail_first_chunk() {
    let h = Harness::new();
    let runner = h.runner(true, h.encoder(None, false));

    let outcome = h.run(&runner, 900);

    assert_eq!(outcome.failure_kind(), Some("DegenerateInput"));
    assert_eq!(outcome.failure.as_ref().unwrap().chunk_index, Some(0));
    assert!(h.encoded.lock().is_empty());
    h.assert_no_leftovers(&runner);
}

#[test]
fn base_only_stream_is_not_confirmed() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(None, true));

    let outcome = h.run(&runner, 600);

    assert!(!outcome.confirmed);
    assert_eq!(outcome.failure_kind(), Some("NotConfirmed"));
    h.assert_no_leftovers(&runner);
}

#[test]
fn missing_stereo_mode_is_rejected() {
    let h = Harness::new();
    let encoder = FakeEncoder {
        noisy_chunk: None,
        base_only: false,
        stereo: false,
        encoded: Arc::clone(&h.encoded),
    };
    let runner = h.runner(false, encoder);

    let outcome = h.run(&runner, 600);

    assert_eq!(outcome.failure_kind(), Some("Rejected(NotStereoMode)"));
    assert_eq!(outcome.failure.as_ref().unwrap().chunk_index, Some(0));
    h.assert_no_leftovers(&runner);
}

#[test]
fn invalid_crop_never_reaches_the_tools() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(None, false));
    let mut source = h.source(300);
    source.crop = CropRect::new(3842, 1080, 0, 0);

    let outcome = runner.run("movie", source, None, None, None);

    assert_eq!(outcome.failure_kind(), Some("InvalidInput"));
    assert!(h.seen_chunks.lock().is_empty());
}

#[test]
fn job_log_is_appended_across_runs() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(None, false));

    let first = h.run(&runner, 300);
    let log = first.log_path.clone().unwrap();
    let len_after_first = fs::metadata(&log).unwrap().len();

    let second = h.run(&runner, 300);
    assert_eq!(second.log_path.as_ref(), Some(&log));
    assert!(fs::metadata(&log).unwrap().len() > len_after_first);
    let content = fs::read_to_string(&log).unwrap();
    assert!(content.contains("=== Plan ==="));
    assert_eq!(content.matches("########## run movie started").count(), 2);
    assert!(content.contains("[chunk_00000] [SUCCESS] Accepted"));
}

#[test]
fn rejected_chunk_lines_carry_its_label() {
    let h = Harness::new();
    let runner = h.runner(false, h.encoder(Some((1, "WARNING: 1 dropped frame")), false));

    let outcome = h.run(&runner, 600);

    let content = fs::read_to_string(outcome.log_path.unwrap()).unwrap();
    assert!(content.contains("--- Chunk 2/2: chunk_00001 frames 300..600 ---"));
    assert!(content.contains("[chunk_00001] Encoder verdict: Rejected(QualityWarning)"));
    assert!(!content.contains("[chunk_00001] [SUCCESS]"));
}
