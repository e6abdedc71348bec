//! BD3D command line front end.
//!
//! ```bash
//! bd3d encode movie.mkv --frames 143856 --fps 24000/1001 --width 3840 --height 1080
//! bd3d encode movie.mkv --frames 143856 --fps 23.976 --width 1920 --height 1080 \
//!     --layout half --crop 1920:800:0:140
//! bd3d verify bd3d_output/movie.264
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*};

use bd3d_core::assembly::verify_stream;
use bd3d_core::config::{validate, ConfigManager, Settings};
use bd3d_core::logging::{env_filter, ConsoleCallback, LogLevel};
use bd3d_core::models::{CropRect, Framerate, SourceDescriptor, SplitGeometry};
use bd3d_core::orchestrator::{describe_logs, JobRunner};

#[derive(Parser, Debug)]
#[command(name = "bd3d", version, about = "Side-by-side to Blu-ray 3D stereo stream encoder")]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(long, global = true, env = "BD3D_CONFIG")]
    config: Option<PathBuf>,

    /// Log level for the application log (RUST_LOG overrides)
    #[arg(long, global = true, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a side-by-side source into a stereo elementary stream
    Encode(EncodeArgs),
    /// Check a stream for dependent-view NAL units
    Verify {
        /// Elementary stream to scan
        stream: PathBuf,
    },
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Side-by-side source video
    source: PathBuf,

    /// Number of frames in the source
    #[arg(long)]
    frames: u64,

    /// Frame rate as num/den, an integer, or an NTSC decimal
    #[arg(long, value_parser = parse_framerate)]
    fps: Framerate,

    /// Full stored frame width
    #[arg(long)]
    width: u32,

    /// Full stored frame height
    #[arg(long)]
    height: u32,

    /// Active area without black bars, as w:h:x:y
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropRect>,

    /// How the two eyes are packed
    #[arg(long, value_enum, default_value_t = Layout::Auto)]
    layout: Layout,

    /// Output stream (default: <output_folder>/<job>.264)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Job name used for logs and work directory (default: source file stem)
    #[arg(long)]
    job_name: Option<String>,

    /// Frames per chunk
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Root folder for per-job work directories
    #[arg(long)]
    temp_root: Option<PathBuf>,

    /// Folder for job logs
    #[arg(long)]
    logs: Option<PathBuf>,

    /// Do not echo the job log to the terminal
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    /// Detect from the frame aspect ratio
    Auto,
    /// Each eye stored at full width
    Full,
    /// Each eye squeezed to half width
    Half,
}

impl Layout {
    fn geometry(self, width: u32, height: u32) -> SplitGeometry {
        match self {
            Layout::Auto => SplitGeometry::detect(width, height),
            Layout::Full => SplitGeometry::FullSbs,
            Layout::Half => SplitGeometry::HalfSbs,
        }
    }
}

fn parse_framerate(value: &str) -> Result<Framerate, String> {
    Framerate::parse(value).map_err(|e| e.to_string())
}

fn parse_crop(value: &str) -> Result<CropRect, String> {
    CropRect::parse(value).map_err(|e| e.to_string())
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    value.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the command succeeded.
fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = ConfigManager::new(&config_path);
    config
        .load_or_create()
        .with_context(|| format!("loading settings from {}", config_path.display()))?;

    match cli.command {
        Command::Verify { stream } => {
            let _guard = init_logging(cli.log_level, None);
            verify(&stream)
        }
        Command::Encode(args) => {
            let mut settings = config.into_settings();
            apply_overrides(&mut settings, &args);
            validate(&settings).context("invalid settings")?;

            let logs = PathBuf::from(&settings.paths.logs_folder);
            let level = cli
                .log_level
                .or_else(|| settings.logging.level.parse().ok())
                .unwrap_or_default();
            let _guard = init_logging(Some(level), Some(&logs));

            encode(settings, args)
        }
    }
}

fn default_config_path() -> PathBuf {
    // XDG config dir on Linux, fallback to current dir
    match directories::ProjectDirs::from("", "", "bd3d") {
        Some(dirs) => dirs.config_dir().join("settings.toml"),
        None => PathBuf::from("settings.toml"),
    }
}

fn apply_overrides(settings: &mut Settings, args: &EncodeArgs) {
    if let Some(size) = args.chunk_size {
        settings.chunking.chunk_size = size;
    }
    if let Some(dir) = &args.temp_root {
        settings.paths.temp_root = dir.display().to_string();
    }
    if let Some(dir) = &args.logs {
        settings.paths.logs_folder = dir.display().to_string();
    }
}

/// Stderr logging, plus a daily log file when `logs_dir` is given.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(level: Option<LogLevel>, logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = env_filter(level.unwrap_or_default());
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match logs_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bd3d.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .try_init();
    guard
}

fn encode(settings: Settings, args: EncodeArgs) -> Result<bool> {
    if !args.source.exists() {
        bail!("source not found: {}", args.source.display());
    }

    let job_name = match &args.job_name {
        Some(name) => name.clone(),
        None => args
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .context("source path has no file name")?,
    };

    let geometry = args.layout.geometry(args.width, args.height);
    let mut source = SourceDescriptor::new(
        &args.source,
        args.frames,
        args.fps,
        args.width,
        args.height,
        geometry,
    );
    if let Some(crop) = args.crop {
        source = source.with_crop(crop);
    }
    source
        .validate()
        .with_context(|| format!("invalid source description for {}", args.source.display()))?;

    tracing::info!(job = %job_name, %geometry, "Starting encode");

    let console: Option<ConsoleCallback> = if args.quiet {
        None
    } else {
        Some(Box::new(|line: &str| println!("{}", line)))
    };

    let runner = JobRunner::from_settings(settings);
    let outcome = runner.run(&job_name, source, args.output.clone(), console, None);

    if outcome.success {
        if let Some(stream) = &outcome.stream {
            println!("Stream: {}", stream.path.display());
        }
        if let Some(summary) = &outcome.summary {
            println!("Summary: {}", summary);
        }
        println!("Dependent view confirmed: {}", outcome.confirmed);
    } else {
        eprintln!(
            "Failed [{}]: {}",
            outcome.failure_kind().unwrap_or("Unknown"),
            outcome.error.as_deref().unwrap_or("no details")
        );
    }
    for (label, path) in describe_logs(&outcome) {
        eprintln!("  {}: {}", label, path.display());
    }

    Ok(outcome.success && outcome.confirmed)
}

fn verify(stream: &Path) -> Result<bool> {
    let verdict =
        verify_stream(stream).with_context(|| format!("scanning {}", stream.display()))?;
    let evidence = verdict.evidence();

    if verdict.is_confirmed() {
        println!("Confirmed: {}", evidence);
    } else {
        println!("NotConfirmed: {}", evidence);
    }
    Ok(verdict.is_confirmed())
}
