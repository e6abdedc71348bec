//! Job runner: sets up one conversion job and drives it through the pipeline.
//!
//! The runner owns everything around the pipeline: the job's logs, its work
//! directory under the temp root, the state manifest written at the end, and
//! the outcome handed to whoever muxes the stream next.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::encoding::{StereoEncoder, X264StereoEncoder};
use crate::extraction::{FfmpegViewExtractor, ViewExtractor};
use crate::logging::{sanitize_filename, ConsoleCallback, JobLogger, LogConfig, ToolEventLog};
use crate::models::{AssembledStream, SourceDescriptor, VerificationVerdict};
use crate::workspace::WorkDir;

use super::create_standard_pipeline;
use super::errors::PipelineError;
use super::pipeline::CancelHandle;
use super::types::{Context, FailureRecord, JobState, ProgressCallback};

/// Totals reported at the end of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub chunks: usize,
    pub frames: u64,
    pub bytes: u64,
    /// Approximate playback duration of the stream.
    pub duration_secs: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks, {} frames, {} bytes, ~{:.1}s",
            self.chunks, self.frames, self.bytes, self.duration_secs
        )
    }
}

/// Result of running one job, handed to the muxing stage.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub job_name: String,
    /// Whether the job completed successfully.
    pub success: bool,
    /// Stream written by the run. Only set on success.
    pub stream: Option<AssembledStream>,
    /// Whether the stream's dependent view was confirmed in the bitstream.
    pub confirmed: bool,
    pub verdict: Option<VerificationVerdict>,
    pub summary: Option<RunSummary>,
    /// Failure details (if failed).
    pub failure: Option<FailureRecord>,
    /// Full error message (if failed).
    pub error: Option<String>,
    pub log_path: Option<PathBuf>,
    pub events_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub steps_completed: Vec<String>,
}

impl PipelineOutcome {
    /// Create a successful outcome from the final job state.
    fn success(job_name: String, state: &JobState, steps_completed: Vec<String>, frame_secs: f64) -> Self {
        let verdict = state.verification;
        let frames = state.encode.as_ref().map(|e| e.frames()).unwrap_or(0);
        let summary = state.assembly.as_ref().map(|s| RunSummary {
            chunks: s.chunk_count,
            frames,
            bytes: s.bytes,
            duration_secs: frames as f64 * frame_secs,
        });

        Self {
            job_name,
            success: true,
            stream: state.assembly.clone(),
            confirmed: verdict.is_some_and(|v| v.is_confirmed()),
            verdict,
            summary,
            failure: None,
            error: None,
            log_path: None,
            events_path: None,
            state_path: None,
            steps_completed,
        }
    }

    /// Create a failed outcome.
    fn failure(job_name: String, failure: FailureRecord, error: impl Into<String>) -> Self {
        Self {
            job_name,
            success: false,
            stream: None,
            confirmed: false,
            verdict: None,
            summary: None,
            failure: Some(failure),
            error: Some(error.into()),
            log_path: None,
            events_path: None,
            state_path: None,
            steps_completed: Vec::new(),
        }
    }

    fn setup_failure(job_name: String, message: impl Into<String>) -> Self {
        let message = message.into();
        let failure = FailureRecord {
            kind: "IoError".to_string(),
            step: None,
            message: message.clone(),
            chunk_index: None,
        };
        Self::failure(job_name, failure, message)
    }

    /// Stable failure reason name, if failed.
    pub fn failure_kind(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.kind.as_str())
    }
}

/// Runs conversion jobs through the standard pipeline.
///
/// # Example
///
/// ```ignore
/// let runner = JobRunner::from_settings(settings);
/// let outcome = runner.run("movie_3d", source, None, None, None);
/// if outcome.confirmed {
///     println!("{}", outcome.stream.unwrap().path.display());
/// }
/// ```
pub struct JobRunner {
    settings: Settings,
    log_dir: PathBuf,
    temp_root: PathBuf,
    output_dir: PathBuf,
    extractor: Arc<dyn ViewExtractor>,
    encoder: Arc<dyn StereoEncoder>,
    cancel: CancelHandle,
}

impl JobRunner {
    /// Create a runner with explicit directories and the ffmpeg/x264 adapters.
    pub fn new(settings: Settings, log_dir: PathBuf, temp_root: PathBuf, output_dir: PathBuf) -> Self {
        let extractor = Arc::new(FfmpegViewExtractor::from_settings(&settings));
        let encoder = Arc::new(X264StereoEncoder::from_settings(&settings));
        Self {
            settings,
            log_dir,
            temp_root,
            output_dir,
            extractor,
            encoder,
            cancel: CancelHandle::new(),
        }
    }

    /// Create a runner using the `[paths]` section for directories.
    pub fn from_settings(settings: Settings) -> Self {
        let paths = &settings.paths;
        let log_dir = PathBuf::from(&paths.logs_folder);
        let temp_root = PathBuf::from(&paths.temp_root);
        let output_dir = PathBuf::from(&paths.output_folder);
        Self::new(settings, log_dir, temp_root, output_dir)
    }

    /// Replace the decoder adapter.
    pub fn with_extractor(mut self, extractor: Arc<dyn ViewExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the encoder adapter.
    pub fn with_encoder(mut self, encoder: Arc<dyn StereoEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Handle that stops the running job at the next chunk or step.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Default output path for a job.
    pub fn output_path_for(&self, job_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.264", sanitize_filename(job_name)))
    }

    /// Run one job to completion.
    ///
    /// Never panics on job failure; every failure is reported in the
    /// returned outcome along with the log paths. No stream is left at the
    /// output path unless the run succeeded.
    pub fn run(
        &self,
        job_name: &str,
        source: SourceDescriptor,
        output_path: Option<PathBuf>,
        console_callback: Option<ConsoleCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> PipelineOutcome {
        let job_name = job_name.to_string();
        let safe_name = sanitize_filename(&job_name);

        // Create logger
        let logger = match JobLogger::new(
            &job_name,
            &self.log_dir,
            LogConfig::from_settings(&self.settings.logging),
            console_callback,
        ) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                let err = PipelineError::setup_failed(&job_name, format!("Failed to create logger: {}", e));
                return PipelineOutcome::setup_failure(job_name, err.to_string());
            }
        };

        let events = match ToolEventLog::open(&job_name, &self.log_dir) {
            Ok(ev) => Arc::new(ev),
            Err(e) => {
                let err = PipelineError::setup_failed(&job_name, format!("Failed to open event log: {}", e));
                logger.error(&err.to_string());
                return self.with_paths(PipelineOutcome::setup_failure(job_name, err.to_string()), &logger, None, None);
            }
        };

        // Create job-specific work directory
        let work_dir = match WorkDir::create(self.temp_root.join(&safe_name)) {
            Ok(w) => w,
            Err(e) => {
                let err = PipelineError::setup_failed(&job_name, format!("Failed to create work directory: {}", e));
                logger.error(&err.to_string());
                return self.with_paths(
                    PipelineOutcome::setup_failure(job_name, err.to_string()),
                    &logger,
                    Some(&events),
                    None,
                );
            }
        };

        let output_path = output_path.unwrap_or_else(|| self.output_path_for(&job_name));
        let frame_secs = source.framerate.frames_to_seconds(1);

        let pipeline = create_standard_pipeline();
        let mut ctx = Context::new(
            source,
            self.settings.clone(),
            &job_name,
            work_dir.clone(),
            output_path,
            Arc::clone(&logger),
            Arc::clone(&events),
            Arc::clone(&self.extractor),
            Arc::clone(&self.encoder),
        )
        .with_cancel_handle(self.cancel.clone());

        // Add progress callback if provided
        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut state = JobState::new(&job_name);

        logger.begin_run(&state.job_id);
        logger.info(&format!("Starting job: {}", job_name));
        logger.info(&format!("Work directory: {}", work_dir.root().display()));
        logger.info(&format!("Output: {}", ctx.output_path.display()));

        let run = pipeline.run(&ctx, &mut state);
        state.finish();

        let outcome = match run {
            Ok(run_result) => {
                let outcome =
                    PipelineOutcome::success(job_name.clone(), &state, run_result.steps_completed, frame_secs);
                if let Some(summary) = &outcome.summary {
                    logger.success(&format!("Job completed: {}", summary));
                }
                outcome
            }
            Err(e) => {
                let failure = failure_record(&e);
                if let Some(output) = e.step_error().and_then(|s| s.tool_output()) {
                    logger.error("Tool output:");
                    for line in output.lines() {
                        logger.error(&format!("  {}", line));
                    }
                }
                logger.error(&format!("Pipeline failed [{}]: {}", failure.kind, e));
                state.failure = Some(failure.clone());
                PipelineOutcome::failure(job_name.clone(), failure, e.to_string())
            }
        };

        if let Err(e) = work_dir.remove() {
            logger.warn(&format!(
                "Could not remove work directory {}: {}",
                work_dir.root().display(),
                e
            ));
        }

        let state_path = self.log_dir.join(format!("{}.state.json", safe_name));
        let state_path = match state.write_json(&state_path) {
            Ok(()) => Some(state_path),
            Err(e) => {
                logger.warn(&format!("Could not write {}: {}", state_path.display(), e));
                None
            }
        };

        let outcome = self.with_paths(outcome, &logger, Some(&events), state_path);
        logger.close();
        outcome
    }

    fn with_paths(
        &self,
        mut outcome: PipelineOutcome,
        logger: &JobLogger,
        events: Option<&ToolEventLog>,
        state_path: Option<PathBuf>,
    ) -> PipelineOutcome {
        outcome.log_path = Some(logger.log_path().to_path_buf());
        outcome.events_path = events.map(|e| e.path().to_path_buf());
        outcome.state_path = state_path;
        outcome
    }
}

fn failure_record(error: &PipelineError) -> FailureRecord {
    let step_error = error.step_error();
    FailureRecord {
        kind: error.kind().to_string(),
        step: error.step_name().map(str::to_string),
        message: step_error.map_or_else(|| error.to_string(), |s| s.to_string()),
        chunk_index: step_error.and_then(|s| s.chunk_index()),
    }
}

/// Log paths of a finished outcome, for error reports.
pub fn describe_logs(outcome: &PipelineOutcome) -> Vec<(&'static str, &Path)> {
    let mut logs = Vec::new();
    if let Some(p) = &outcome.log_path {
        logs.push(("job log", p.as_path()));
    }
    if let Some(p) = &outcome.events_path {
        logs.push(("event log", p.as_path()));
    }
    if let Some(p) = &outcome.state_path {
        logs.push(("state", p.as_path()));
    }
    logs
}
