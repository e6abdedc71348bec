//! Configuration management for the BD3D encoder.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use bd3d_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Chunk size: {}", config.settings().chunking.chunk_size);
//!
//! // Modify a setting and save just that section
//! config.settings_mut().encoding.crf = 20;
//! config.update_section(ConfigSection::Encoding).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{validate, ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ChunkingSettings, ClassificationSettings, ConfigSection, EncodingSettings, LoggingSettings,
    PathSettings, Settings, ToolSettings,
};
