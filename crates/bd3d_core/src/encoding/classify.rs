//! Classification of encoder output.
//!
//! One pure function decides whether a chunk is usable from the encoder's
//! exit status and its full textual output. Rules apply in order and the
//! first match wins:
//!
//! 1. non-zero exit (or killed) -> `NonZeroExit`
//! 2. no 3D-mode confirmation -> `NotStereoMode`
//! 3. any warning, dropped-frame or duplicate-frame marker -> `QualityWarning`
//! 4. otherwise accepted

use std::path::Path;

use crate::config::ClassificationSettings;
use crate::models::{ChunkEncodeResult, RejectReason};

/// Lines of output quoted in a non-zero-exit diagnostic.
const DIAGNOSTIC_TAIL: usize = 5;

/// Marker strings the classifier looks for. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationMarkers {
    pub stereo_marker: String,
    pub warning_markers: Vec<String>,
}

impl Default for ClassificationMarkers {
    fn default() -> Self {
        Self::from_settings(&ClassificationSettings::default())
    }
}

impl ClassificationMarkers {
    pub fn from_settings(settings: &ClassificationSettings) -> Self {
        Self {
            stereo_marker: settings.stereo_marker.to_lowercase(),
            warning_markers: settings
                .warning_markers
                .iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

/// Classify one encoder run.
///
/// `exit_code` is `None` when the encoder was killed (timeout or signal).
pub fn classify(
    exit_code: Option<i32>,
    output: &str,
    encoded_path: &Path,
    markers: &ClassificationMarkers,
) -> ChunkEncodeResult {
    let lowered = output.to_lowercase();
    let hint = missing_stereo_support_hint(&lowered);

    match exit_code {
        Some(0) => {}
        Some(code) => {
            return ChunkEncodeResult::rejected(
                RejectReason::NonZeroExit,
                with_hint(
                    format!("encoder exited with code {}{}", code, quoted_tail(output)),
                    hint,
                ),
            );
        }
        None => {
            return ChunkEncodeResult::rejected(
                RejectReason::NonZeroExit,
                format!("encoder was killed before finishing{}", quoted_tail(output)),
            );
        }
    }

    if !lowered.contains(&markers.stereo_marker.to_lowercase()) {
        return ChunkEncodeResult::rejected(
            RejectReason::NotStereoMode,
            with_hint(
                format!(
                    "encoder output does not confirm '{}'",
                    markers.stereo_marker
                ),
                hint,
            ),
        );
    }

    for line in output.lines() {
        let lowered_line = line.to_lowercase();
        if let Some(marker) = markers
            .warning_markers
            .iter()
            .find(|m| lowered_line.contains(m.to_lowercase().as_str()))
        {
            return ChunkEncodeResult::rejected(
                RejectReason::QualityWarning,
                format!("matched '{}' in: {}", marker, line.trim()),
            );
        }
    }

    ChunkEncodeResult::Accepted(encoded_path.to_path_buf())
}

/// Hint for encoder builds without 3D support.
fn missing_stereo_support_hint(lowered_output: &str) -> Option<&'static str> {
    let unknown_option = lowered_output
        .lines()
        .any(|l| l.contains("unknown option") && (l.contains("stereo") || l.contains("mvc")));

    unknown_option.then_some(
        "the encoder build does not support 3D (MVC) encoding; install an MVC-capable build",
    )
}

fn with_hint(message: String, hint: Option<&str>) -> String {
    match hint {
        Some(hint) => format!("{} (hint: {})", message, hint),
        None => message,
    }
}

fn quoted_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL);
    format!(": {}", lines[start..].join(" | "))
}
