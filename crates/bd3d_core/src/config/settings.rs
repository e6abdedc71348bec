//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::chunking::DEFAULT_CHUNK_SIZE;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Chunk planning.
    #[serde(default)]
    pub chunking: ChunkingSettings,

    /// External tool locations and limits.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Encoder quality parameters.
    #[serde(default)]
    pub encoding: EncodingSettings,

    /// Encoder output classification markers.
    #[serde(default)]
    pub classification: ClassificationSettings,
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for the assembled stream.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job work directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for job logs, event logs and state manifests.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "bd3d_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (suppress tool output lines).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show on failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix job log lines with timestamps.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Minimum level written to the job log (`debug`, `info`, `warn`, `error`).
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            show_timestamps: true,
            level: default_level(),
        }
    }
}

/// Chunk planning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Frames per chunk (last chunk may be shorter).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Decoder used for view extraction.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// MVC-capable encoder binary.
    #[serde(default = "default_encoder_path")]
    pub encoder_path: String,

    /// Wall-clock limit per extraction in seconds (0 disables).
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_secs: u64,

    /// Wall-clock limit per chunk encode in seconds (0 disables).
    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_encoder_path() -> String {
    "x264".to_string()
}

fn default_extract_timeout() -> u64 {
    1800
}

fn default_encode_timeout() -> u64 {
    7200
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            encoder_path: default_encoder_path(),
            extract_timeout_secs: default_extract_timeout(),
            encode_timeout_secs: default_encode_timeout(),
        }
    }
}

/// Encoder quality configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    #[serde(default = "default_crf")]
    pub crf: u32,

    #[serde(default = "default_preset")]
    pub preset: String,

    /// H.264 level (Blu-ray 3D requires 4.1).
    #[serde(default = "default_h264_level")]
    pub level: String,

    #[serde(default = "default_vbv_maxrate")]
    pub vbv_maxrate: u32,

    #[serde(default = "default_vbv_bufsize")]
    pub vbv_bufsize: u32,

    #[serde(default = "default_slices")]
    pub slices: u32,

    /// Width of each padded eye frame.
    #[serde(default = "default_output_width")]
    pub output_width: u32,

    /// Height of each padded eye frame.
    #[serde(default = "default_output_height")]
    pub output_height: u32,
}

fn default_crf() -> u32 {
    22
}

fn default_preset() -> String {
    "slow".to_string()
}

fn default_h264_level() -> String {
    "4.1".to_string()
}

fn default_vbv_maxrate() -> u32 {
    40000
}

fn default_vbv_bufsize() -> u32 {
    30000
}

fn default_slices() -> u32 {
    4
}

fn default_output_width() -> u32 {
    1920
}

fn default_output_height() -> u32 {
    1080
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            crf: default_crf(),
            preset: default_preset(),
            level: default_h264_level(),
            vbv_maxrate: default_vbv_maxrate(),
            vbv_bufsize: default_vbv_bufsize(),
            slices: default_slices(),
            output_width: default_output_width(),
            output_height: default_output_height(),
        }
    }
}

/// Markers used to classify encoder output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSettings {
    /// Text that confirms the encoder ran in 3D mode.
    #[serde(default = "default_stereo_marker")]
    pub stereo_marker: String,

    /// Case-insensitive substrings that reject a chunk.
    #[serde(default = "default_warning_markers")]
    pub warning_markers: Vec<String>,
}

fn default_stereo_marker() -> String {
    "3D mode".to_string()
}

fn default_warning_markers() -> Vec<String> {
    [
        "warning:",
        "[warning]",
        "dropped frame",
        "frames dropped",
        "duplicate frame",
        "duplicated frame",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            stereo_marker: default_stereo_marker(),
            warning_markers: default_warning_markers(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Chunking,
    Tools,
    Encoding,
    Classification,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Chunking => "chunking",
            ConfigSection::Tools => "tools",
            ConfigSection::Encoding => "encoding",
            ConfigSection::Classification => "classification",
        }
    }
}
