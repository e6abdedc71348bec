//! Config manager for loading, saving, and atomic updates.
//!
//! Key features:
//! - Atomic writes (write to temp file, then rename)
//! - Section-level updates (only modified section is changed)
//! - Validation of values the pipeline depends on
//! - Preserves comments and formatting with toml_edit

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// Highest CRF value the encoder accepts for 8-bit output.
const MAX_CRF: u32 = 51;

/// Table names the config file may contain.
const VALID_SECTIONS: [&str; 6] = [
    "paths",
    "logging",
    "chunking",
    "tools",
    "encoding",
    "classification",
];

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Manages application configuration.
///
/// Handles loading, saving, and atomic section-level updates.
pub struct ConfigManager {
    /// Path to the config file.
    config_path: PathBuf,
    /// Current settings loaded in memory.
    settings: Settings,
}

impl ConfigManager {
    /// Create a new config manager with the given config file path.
    ///
    /// Does not load the config - call `load()` or `load_or_create()` after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get a reference to the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a mutable reference to the current settings.
    ///
    /// Note: Changes made here are only in memory until `save()` or
    /// `update_section()` is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Consume the manager, returning the loaded settings.
    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Load config from file.
    ///
    /// Returns error if file doesn't exist or a value is out of range.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        let settings: Settings = toml::from_str(&content)?;
        validate(&settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Load config from file, creating with defaults if it doesn't exist.
    ///
    /// Missing keys are filled in and written back.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = parse_and_check(&content)?;
            validate(&settings)?;
            self.settings = settings;

            if was_modified {
                tracing::debug!(path = %self.config_path.display(), "Rewriting config with defaults");
                self.save()?;
            }
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Ensure all configured directories exist.
    ///
    /// Creates output, temp, and logs directories if they don't exist.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let dirs = [
            &self.settings.paths.output_folder,
            &self.settings.paths.temp_root,
            &self.settings.paths.logs_folder,
        ];

        for dir in dirs {
            let path = PathBuf::from(dir);
            if !path.exists() {
                fs::create_dir_all(&path)?;
            }
        }

        Ok(())
    }

    /// Get the logs folder path.
    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Update a specific section atomically.
    ///
    /// Re-reads the file from disk, replaces only the given table, and
    /// writes back atomically. Comments elsewhere in the file survive.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_toml = self.section_toml(section)?;
        let section_doc: DocumentMut = section_toml.parse()?;
        doc[section.table_name()] = Item::Table(section_doc.as_table().clone());

        self.atomic_write(&doc.to_string())?;

        Ok(())
    }

    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        let content = match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
            ConfigSection::Chunking => toml::to_string_pretty(&s.chunking)?,
            ConfigSection::Tools => toml::to_string_pretty(&s.tools)?,
            ConfigSection::Encoding => toml::to_string_pretty(&s.encoding)?,
            ConfigSection::Classification => toml::to_string_pretty(&s.classification)?,
        };
        Ok(content)
    }

    /// Generate config content with helpful comments.
    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let sections = [
            (ConfigSection::Paths, "Output, work and log directories"),
            (ConfigSection::Logging, "Job log configuration"),
            (ConfigSection::Chunking, "Frames per encoding chunk"),
            (
                ConfigSection::Tools,
                "External tools (timeouts in seconds, 0 disables)",
            ),
            (ConfigSection::Encoding, "Encoder quality parameters"),
            (
                ConfigSection::Classification,
                "Encoder output markers (warning markers match case-insensitively)",
            ),
        ];

        let mut output = String::new();
        output.push_str("# BD3D Encoder Configuration\n");
        output.push_str(
            "# This file is auto-generated. Comments may be preserved on section updates.\n",
        );

        for (section, comment) in sections {
            output.push('\n');
            output.push_str(&format!("# {}\n", comment));
            output.push_str(&format!("[{}]\n", section.table_name()));
            for line in self.section_toml(section)?.lines() {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    /// Write content to config file atomically.
    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file in same directory so the rename stays on one filesystem
        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

/// Parse content, reporting whether it needs rewriting (unknown tables or
/// missing defaults).
fn parse_and_check(content: &str) -> ConfigResult<(Settings, bool)> {
    let doc: DocumentMut = content.parse()?;
    let settings: Settings = toml::from_str(content)?;

    let has_unknown = doc.iter().any(|(key, _)| !VALID_SECTIONS.contains(&key));
    let has_missing = VALID_SECTIONS.iter().any(|name| !doc.contains_key(name));

    Ok((settings, has_unknown || has_missing))
}

/// Check values the pipeline cannot run without.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    if settings.chunking.chunk_size == 0 {
        return Err(ConfigError::invalid(
            "chunking.chunk_size",
            "must be greater than zero",
        ));
    }

    let encoding = &settings.encoding;
    if encoding.crf > MAX_CRF {
        return Err(ConfigError::invalid(
            "encoding.crf",
            format!("{} exceeds {}", encoding.crf, MAX_CRF),
        ));
    }
    if encoding.output_width == 0
        || encoding.output_height == 0
        || encoding.output_width % 2 != 0
        || encoding.output_height % 2 != 0
    {
        return Err(ConfigError::invalid(
            "encoding.output_width/output_height",
            format!(
                "{}x{} must be non-zero and even",
                encoding.output_width, encoding.output_height
            ),
        ));
    }

    if settings.classification.stereo_marker.trim().is_empty() {
        return Err(ConfigError::invalid(
            "classification.stereo_marker",
            "must not be empty",
        ));
    }

    if settings
        .classification
        .warning_markers
        .iter()
        .all(|m| m.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "classification.warning_markers",
            "needs at least one non-empty marker",
        ));
    }

    if settings.tools.ffmpeg_path.trim().is_empty() || settings.tools.encoder_path.trim().is_empty()
    {
        return Err(ConfigError::invalid("tools", "tool paths must not be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        for name in VALID_SECTIONS {
            assert!(content.contains(&format!("[{}]", name)), "missing [{}]", name);
        }

        // Generated file loads back cleanly
        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().chunking.chunk_size, 300);
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        fs::write(&config_path, "[chunking]\nchunk_size = 120\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().chunking.chunk_size, 120);
        // Missing sections were written back
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[encoding]"));
        assert!(content.contains("chunk_size = 120"));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        manager.settings_mut().encoding.crf = 18;
        manager.update_section(ConfigSection::Encoding).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("crf = 18"));
        assert!(content.contains("[paths]"));
        assert!(content.contains("# BD3D Encoder Configuration"));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let temp_path = config_path.with_extension("toml.tmp");
        assert!(!temp_path.exists());
    }

    #[test]
    fn load_rejects_zero_chunk_size() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[chunking]\nchunk_size = 0\n").unwrap();

        let mut manager = ConfigManager::new(&config_path);
        let err = manager.load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "chunking.chunk_size"));
    }

    #[test]
    fn validate_rejects_odd_output_frame_and_empty_marker() {
        let mut settings = Settings::default();
        settings.encoding.output_width = 1919;
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.classification.stereo_marker = "  ".to_string();
        assert!(validate(&settings).is_err());

        let mut settings = Settings::default();
        settings.classification.warning_markers.clear();
        assert!(matches!(
            validate(&settings),
            Err(ConfigError::Invalid { ref key, .. }) if key == "classification.warning_markers"
        ));

        assert!(validate(&Settings::default()).is_ok());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("absent.toml"));
        assert!(matches!(manager.load(), Err(ConfigError::NotFound(_))));
    }
}
