//! Stereo (MVC) encoder adapter for x264 builds with 3D support.

use std::fs;
use std::path::Path;

use crate::config::Settings;
use crate::logging::ToolReporter;
use crate::models::{ChunkEncodeResult, Framerate, RejectReason, ViewPair};
use crate::process::{run_tool, RunOptions, ToolCommand, ToolRun};

use super::classify::{classify, ClassificationMarkers};
use super::{EncodingError, EncodingResult};

/// Encodes one chunk's view pair into a combined base + dependent view stream.
pub trait StereoEncoder: Send + Sync {
    /// Encode `views` into `output` and classify the result.
    ///
    /// Tool rejections are returned as `Ok(Rejected { .. })`; `Err` is
    /// reserved for failures to run the encoder at all.
    fn encode(
        &self,
        views: &ViewPair,
        framerate: Framerate,
        output: &Path,
        reporter: &ToolReporter<'_>,
    ) -> EncodingResult<ChunkEncodeResult>;
}

/// Quality and compliance parameters for the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingParameters {
    pub crf: u32,
    pub preset: String,
    pub level: String,
    pub vbv_maxrate: u32,
    pub vbv_bufsize: u32,
    pub slices: u32,
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl EncodingParameters {
    pub fn from_settings(settings: &Settings) -> Self {
        let e = &settings.encoding;
        Self {
            crf: e.crf,
            preset: e.preset.clone(),
            level: e.level.clone(),
            vbv_maxrate: e.vbv_maxrate,
            vbv_bufsize: e.vbv_bufsize,
            slices: e.slices,
        }
    }

    /// Full argument list for one chunk.
    ///
    /// Fixed flags: single combined MVC output, timing SEI/VUI
    /// (`--pic-struct`, `--nal-hrd vbr`), Blu-ray compatibility and no
    /// B-pyramid. GOP length is capped at one second.
    pub fn build_args(&self, views: &ViewPair, framerate: Framerate, output: &Path) -> Vec<String> {
        let keyint = framerate.rounded();

        let mut args: Vec<String> = vec![
            "--input-res".into(),
            views.resolution(),
            "--fps".into(),
            framerate.to_string(),
            "--frames".into(),
            views.frames.to_string(),
            "--stereo-mode".into(),
            "mvc".into(),
            "--bluray-compat".into(),
            "--level".into(),
            self.level.clone(),
            "--preset".into(),
            self.preset.clone(),
            "--crf".into(),
            self.crf.to_string(),
            "--vbv-maxrate".into(),
            self.vbv_maxrate.to_string(),
            "--vbv-bufsize".into(),
            self.vbv_bufsize.to_string(),
            "--keyint".into(),
            keyint.to_string(),
            "--open-gop".into(),
            "--b-pyramid".into(),
            "none".into(),
            "--slices".into(),
            self.slices.to_string(),
            "--nal-hrd".into(),
            "vbr".into(),
            "--pic-struct".into(),
            "--sar".into(),
            "1:1".into(),
            "--output".into(),
        ];
        args.push(output.to_string_lossy().into_owned());
        args.push(views.left.to_string_lossy().into_owned());
        args.push(views.right.to_string_lossy().into_owned());
        args
    }
}

/// Adapter driving an MVC-capable x264 binary.
#[derive(Debug, Clone)]
pub struct X264StereoEncoder {
    encoder_path: String,
    params: EncodingParameters,
    markers: ClassificationMarkers,
    timeout_secs: u64,
}

impl X264StereoEncoder {
    pub fn new(
        encoder_path: impl Into<String>,
        params: EncodingParameters,
        markers: ClassificationMarkers,
    ) -> Self {
        Self {
            encoder_path: encoder_path.into(),
            params,
            markers,
            timeout_secs: 0,
        }
    }

    /// Build from the `[tools]`, `[encoding]` and `[classification]` sections.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            encoder_path: settings.tools.encoder_path.clone(),
            params: EncodingParameters::from_settings(settings),
            markers: ClassificationMarkers::from_settings(&settings.classification),
            timeout_secs: settings.tools.encode_timeout_secs,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build_command(&self, views: &ViewPair, framerate: Framerate, output: &Path) -> ToolCommand {
        ToolCommand::new(self.encoder_path.clone()).args(self.params.build_args(views, framerate, output))
    }
}

impl StereoEncoder for X264StereoEncoder {
    fn encode(
        &self,
        views: &ViewPair,
        framerate: Framerate,
        output: &Path,
        reporter: &ToolReporter<'_>,
    ) -> EncodingResult<ChunkEncodeResult> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EncodingError::io(format!("creating {}", parent.display()), e))?;
        }

        let command = self.build_command(views, framerate, output);
        let options = RunOptions::with_timeout_secs(self.timeout_secs);
        let (run, mut result) = match run_tool(&command, &options, Some(reporter.logger)) {
            Ok(run) => {
                let exit_code = if run.timed_out { None } else { run.exit_code };
                let result = classify(exit_code, &run.output, output, &self.markers);
                (run, result)
            }
            Err(e) => {
                reporter.logger.error(&e.to_string());
                let result = ChunkEncodeResult::rejected(
                    RejectReason::NonZeroExit,
                    format!("encoder could not be run: {}", e),
                );
                (ToolRun::not_started(&command, &e), result)
            }
        };

        // An accepted run must also have left a usable file behind
        if result.is_accepted() {
            let size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
            if size == 0 {
                result = ChunkEncodeResult::rejected(
                    RejectReason::NonZeroExit,
                    format!("encoder reported success but {} is missing or empty", output.display()),
                );
            }
        }

        reporter.record(&run, views.chunk.index, "encode", &result.outcome_label());

        if let ChunkEncodeResult::Rejected { reason, diagnostic } = &result {
            reporter.logger.show_tail(&run.tool);
            tracing::warn!(chunk = views.chunk.index, %reason, "Encoder output rejected: {}", diagnostic);
        }

        Ok(result)
    }
}
