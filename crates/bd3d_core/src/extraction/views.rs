//! Left/right raw view extraction with ffmpeg.
//!
//! Each eye is decoded separately into a planar yuv420p file sized to the
//! output frame: the chunk's frame range is trimmed, the eye's half of the
//! active area is cropped, half-SBS views are stretched back to full width,
//! and the picture is centred on a black canvas.

use std::fs;

use crate::config::Settings;
use crate::logging::ToolReporter;
use crate::models::{yuv420p_frame_bytes, Chunk, Eye, SourceDescriptor, ViewPair};
use crate::process::{run_tool, RunOptions, ToolCommand, ToolRun};
use crate::workspace::ChunkWorkspace;

use super::{ExtractionError, ExtractionResult};

/// Materializes the two raw views of one chunk.
pub trait ViewExtractor: Send + Sync {
    /// Write `left.yuv` and `right.yuv` into `workspace` for `chunk`.
    fn extract(
        &self,
        source: &SourceDescriptor,
        chunk: &Chunk,
        workspace: &ChunkWorkspace,
        reporter: &ToolReporter<'_>,
    ) -> ExtractionResult<ViewPair>;
}

/// Largest even size with the same aspect ratio that fits in the bounds.
///
/// Sizes already inside the bounds are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let even = |v: f64| ((v.floor() as u32) & !1).max(2);
    (even(width as f64 * scale), even(height as f64 * scale))
}

/// ffmpeg filter graph producing one eye of one chunk.
pub fn eye_filter(
    source: &SourceDescriptor,
    eye: Eye,
    chunk: &Chunk,
    output_width: u32,
    output_height: u32,
) -> String {
    let region = source.eye_region(eye);
    let (display_w, display_h) = source.eye_display_size();
    let (target_w, target_h) = fit_within(display_w, display_h, output_width, output_height);

    let mut filters = vec![
        format!("trim=start_frame={}:end_frame={}", chunk.start, chunk.end),
        "setpts=PTS-STARTPTS".to_string(),
        format!(
            "crop={}:{}:{}:{}",
            region.width, region.height, region.x, region.y
        ),
    ];

    if (target_w, target_h) != (region.width, region.height) {
        filters.push(format!("scale={}:{}", target_w, target_h));
    }

    filters.push("setsar=1".to_string());

    if (target_w, target_h) != (output_width, output_height) {
        filters.push(format!("pad={}:{}:-1:-1", output_width, output_height));
    }

    filters.join(",")
}

/// Extractor driving the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegViewExtractor {
    ffmpeg_path: String,
    output_width: u32,
    output_height: u32,
    timeout_secs: u64,
}

impl FfmpegViewExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, output_width: u32, output_height: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            output_width,
            output_height,
            timeout_secs: 0,
        }
    }

    /// Build from the `[tools]` and `[encoding]` sections.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ffmpeg_path: settings.tools.ffmpeg_path.clone(),
            output_width: settings.encoding.output_width,
            output_height: settings.encoding.output_height,
            timeout_secs: settings.tools.extract_timeout_secs,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Command decoding one eye of `chunk` into `output`.
    pub fn build_command(
        &self,
        source: &SourceDescriptor,
        eye: Eye,
        chunk: &Chunk,
        output: &std::path::Path,
    ) -> ToolCommand {
        let filter = eye_filter(source, eye, chunk, self.output_width, self.output_height);

        ToolCommand::new(self.ffmpeg_path.clone())
            .args(["-hide_banner", "-nostdin", "-y", "-loglevel", "warning"])
            .arg("-i")
            .path_arg(&source.path)
            .args(["-map", "0:v:0", "-an", "-sn", "-dn"])
            .arg("-vf")
            .arg(filter)
            .args(["-f", "rawvideo", "-pix_fmt", "yuv420p"])
            .path_arg(output)
    }

    /// Run one eye and check the produced file holds whole frames.
    fn extract_eye(
        &self,
        source: &SourceDescriptor,
        eye: Eye,
        chunk: &Chunk,
        workspace: &ChunkWorkspace,
        reporter: &ToolReporter<'_>,
    ) -> ExtractionResult<u64> {
        let output = workspace.view_path(eye);
        let command = self.build_command(source, eye, chunk, &output);
        let options = RunOptions::with_timeout_secs(self.timeout_secs);

        let run = match run_tool(&command, &options, Some(reporter.logger)) {
            Ok(run) => run,
            Err(e) => {
                let run = ToolRun::not_started(&command, &e);
                reporter.record(&run, chunk.index, eye.name(), "ExtractionFailed(not started)");
                return Err(ExtractionError::failed(chunk.index, e.to_string(), String::new()));
            }
        };

        let verdict = self.check_output(&run, &output, chunk);
        let outcome = match &verdict {
            Ok(frames) => format!("Extracted({} frames)", frames),
            Err(e) => format!("ExtractionFailed({})", e),
        };
        reporter.record(&run, chunk.index, eye.name(), &outcome);

        if verdict.is_err() {
            reporter.logger.show_tail(&run.tool);
        }
        verdict
    }

    fn check_output(
        &self,
        run: &ToolRun,
        output: &std::path::Path,
        chunk: &Chunk,
    ) -> ExtractionResult<u64> {
        if run.timed_out {
            return Err(ExtractionError::failed(
                chunk.index,
                format!("{} exceeded {}s time limit", run.tool, self.timeout_secs),
                run.output.clone(),
            ));
        }
        if !run.success() {
            return Err(ExtractionError::failed(
                chunk.index,
                format!("{} exited with code {}", run.tool, run.effective_exit_code()),
                run.output.clone(),
            ));
        }

        let size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        let frame_bytes = yuv420p_frame_bytes(self.output_width, self.output_height).max(1);

        if size == 0 {
            return Err(ExtractionError::failed(
                chunk.index,
                "decoder produced no frames",
                run.output.clone(),
            ));
        }
        if size % frame_bytes != 0 {
            return Err(ExtractionError::failed(
                chunk.index,
                format!(
                    "output is {} bytes, not a whole number of {}x{} frames",
                    size, self.output_width, self.output_height
                ),
                run.output.clone(),
            ));
        }

        Ok(size / frame_bytes)
    }
}

impl ViewExtractor for FfmpegViewExtractor {
    fn extract(
        &self,
        source: &SourceDescriptor,
        chunk: &Chunk,
        workspace: &ChunkWorkspace,
        reporter: &ToolReporter<'_>,
    ) -> ExtractionResult<ViewPair> {
        let left_frames = self.extract_eye(source, Eye::Left, chunk, workspace, reporter)?;
        let right_frames = self.extract_eye(source, Eye::Right, chunk, workspace, reporter)?;

        if left_frames != right_frames {
            return Err(ExtractionError::failed(
                chunk.index,
                format!(
                    "left view has {} frames but right view has {}",
                    left_frames, right_frames
                ),
                String::new(),
            ));
        }

        // Frame counts from analysis can be estimates
        if left_frames != chunk.len() {
            reporter.logger.warn(&format!(
                "{}: expected {} frames, decoder produced {}",
                chunk,
                chunk.len(),
                left_frames
            ));
        }

        Ok(ViewPair {
            chunk: *chunk,
            left: workspace.view_path(Eye::Left),
            right: workspace.view_path(Eye::Right),
            frame_width: self.output_width,
            frame_height: self.output_height,
            frames: left_frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CropRect, Framerate, SplitGeometry};

    fn source(width: u32, height: u32, geometry: SplitGeometry) -> SourceDescriptor {
        SourceDescriptor::new(
            "/media/movie.mkv",
            700,
            Framerate::new(24000, 1001).unwrap(),
            width,
            height,
            geometry,
        )
    }

    #[test]
    fn half_sbs_filter_stretches_and_pads() {
        let src = source(1920, 1080, SplitGeometry::HalfSbs)
            .with_crop(CropRect::new(1920, 800, 0, 140));
        let chunk = Chunk::new(2, 600, 700);

        assert_eq!(
            eye_filter(&src, Eye::Right, &chunk, 1920, 1080),
            "trim=start_frame=600:end_frame=700,setpts=PTS-STARTPTS,\
             crop=960:800:960:140,scale=1920:800,setsar=1,pad=1920:1080:-1:-1"
        );
    }

    #[test]
    fn full_sbs_filter_needs_no_scale_or_pad() {
        let src = source(3840, 1080, SplitGeometry::FullSbs);
        let chunk = Chunk::new(0, 0, 300);

        assert_eq!(
            eye_filter(&src, Eye::Left, &chunk, 1920, 1080),
            "trim=start_frame=0:end_frame=300,setpts=PTS-STARTPTS,crop=1920:1080:0:0,setsar=1"
        );
    }

    #[test]
    fn oversized_eyes_are_fitted() {
        assert_eq!(fit_within(3840, 2160, 1920, 1080), (1920, 1080));
        assert_eq!(fit_within(3840, 1600, 1920, 1080), (1920, 800));
        assert_eq!(fit_within(1280, 720, 1920, 1080), (1280, 720));
    }

    #[test]
    fn command_writes_raw_yuv() {
        let src = source(3840, 1080, SplitGeometry::FullSbs);
        let extractor = FfmpegViewExtractor::new("ffmpeg", 1920, 1080);
        let cmd = extractor.build_command(
            &src,
            Eye::Left,
            &Chunk::new(0, 0, 300),
            std::path::Path::new("/tmp/job/chunk_00000/left.yuv"),
        );
        let line = cmd.command_line();

        assert!(line.starts_with("ffmpeg -hide_banner"));
        assert!(line.contains("-i /media/movie.mkv"));
        assert!(line.contains("-f rawvideo -pix_fmt yuv420p /tmp/job/chunk_00000/left.yuv"));
    }
}
