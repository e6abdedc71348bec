//! Source description supplied by the analysis collaborator.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage aspect ratio above which a frame is treated as full side-by-side.
///
/// Full SBS is ~3.55:1 (32:9), half SBS is ~1.77:1 (16:9).
const FULL_SBS_ASPECT_THRESHOLD: f64 = 2.5;

/// Errors raised while building or validating source models.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid framerate '{0}'")]
    InvalidFramerate(String),

    #[error("Invalid crop geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),
}

/// Exact rational framerate (e.g. 24000/1001).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    /// Create a framerate, rejecting zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Result<Self, ModelError> {
        if num == 0 || den == 0 {
            return Err(ModelError::InvalidFramerate(format!("{}/{}", num, den)));
        }
        Ok(Self { num, den })
    }

    /// Parse a framerate string.
    ///
    /// Accepts `num/den` (ffprobe `r_frame_rate` format), plain integers,
    /// and the NTSC decimals 23.976, 29.97 and 59.94. Any other decimal is
    /// rejected because it cannot be represented exactly.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let trimmed = value.trim();
        let invalid = || ModelError::InvalidFramerate(trimmed.to_string());

        if let Some((num, den)) = trimmed.split_once('/') {
            let num: u32 = num.trim().parse().map_err(|_| invalid())?;
            let den: u32 = den.trim().parse().map_err(|_| invalid())?;
            return Self::new(num, den).map_err(|_| invalid());
        }

        match trimmed {
            "23.976" | "23.98" => return Self::new(24000, 1001),
            "29.97" => return Self::new(30000, 1001),
            "59.94" => return Self::new(60000, 1001),
            _ => {}
        }

        let whole: u32 = trimmed.parse().map_err(|_| invalid())?;
        Self::new(whole, 1).map_err(|_| invalid())
    }

    /// Framerate as a floating point value (for display only).
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Duration in seconds of the given number of frames.
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 * self.den as f64 / self.num as f64
    }

    /// Nearest integer framerate, used for GOP sizing.
    pub fn rounded(&self) -> u32 {
        ((self.num as f64 / self.den as f64).round() as u32).max(1)
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Framerate {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Side-by-side packing of the two eye views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitGeometry {
    /// Each eye keeps full horizontal resolution (e.g. 3840x1080).
    FullSbs,
    /// Each eye is squeezed to half horizontal resolution (e.g. 1920x1080).
    #[default]
    HalfSbs,
}

impl SplitGeometry {
    /// Classify a frame by its storage aspect ratio.
    pub fn detect(width: u32, height: u32) -> Self {
        if height == 0 {
            return Self::HalfSbs;
        }
        if width as f64 / height as f64 > FULL_SBS_ASPECT_THRESHOLD {
            Self::FullSbs
        } else {
            Self::HalfSbs
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FullSbs => "Full SBS",
            Self::HalfSbs => "Half SBS",
        }
    }
}

impl fmt::Display for SplitGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitGeometry {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "full" | "fullsbs" => Ok(Self::FullSbs),
            "half" | "halfsbs" => Ok(Self::HalfSbs),
            other => Err(ModelError::InvalidSource(format!(
                "unknown split geometry '{}' (expected full or half)",
                other
            ))),
        }
    }
}

/// Active-area rectangle inside the full SBS frame (black bars removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    pub fn new(width: u32, height: u32, x: u32, y: u32) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }

    /// Crop covering the whole frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(width, height, 0, 0)
    }

    /// Parse ffmpeg cropdetect notation `w:h:x:y`.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let parts: Vec<&str> = value.trim().trim_start_matches("crop=").split(':').collect();
        if parts.len() != 4 {
            return Err(ModelError::InvalidGeometry(format!(
                "expected w:h:x:y, got '{}'",
                value
            )));
        }

        let mut numbers = [0u32; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.trim().parse().map_err(|_| {
                ModelError::InvalidGeometry(format!("non-numeric crop component '{}'", part))
            })?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2], numbers[3]))
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// One eye of the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn name(&self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Region of the source frame holding one eye's picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeRegion {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Immutable description of the source, produced by the analysis collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Container path of the SBS source.
    pub path: PathBuf,
    /// Total number of frames (> 0).
    pub frame_count: u64,
    /// Exact source framerate.
    pub framerate: Framerate,
    /// Full storage frame width.
    pub frame_width: u32,
    /// Full storage frame height.
    pub frame_height: u32,
    /// Active area within the frame.
    pub crop: CropRect,
    /// How the two eyes are packed.
    pub geometry: SplitGeometry,
}

impl SourceDescriptor {
    /// Create a descriptor whose crop covers the whole frame.
    pub fn new(
        path: impl Into<PathBuf>,
        frame_count: u64,
        framerate: Framerate,
        frame_width: u32,
        frame_height: u32,
        geometry: SplitGeometry,
    ) -> Self {
        Self {
            path: path.into(),
            frame_count,
            framerate,
            frame_width,
            frame_height,
            crop: CropRect::full_frame(frame_width, frame_height),
            geometry,
        }
    }

    /// Replace the active-area crop.
    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }

    /// Check every structural invariant of the descriptor.
    ///
    /// Eye regions must be equal and chroma aligned for yuv420p, so the crop
    /// width must be a multiple of 4 and height and offsets must be even.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.frame_count == 0 {
            return Err(ModelError::InvalidSource("frame count must be > 0".to_string()));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ModelError::InvalidSource(format!(
                "frame size {}x{} is empty",
                self.frame_width, self.frame_height
            )));
        }

        let crop = &self.crop;
        if crop.width == 0 || crop.height == 0 {
            return Err(ModelError::InvalidGeometry(format!("crop {} is empty", crop)));
        }
        if crop.x as u64 + crop.width as u64 > self.frame_width as u64
            || crop.y as u64 + crop.height as u64 > self.frame_height as u64
        {
            return Err(ModelError::InvalidGeometry(format!(
                "crop {} exceeds frame {}x{}",
                crop, self.frame_width, self.frame_height
            )));
        }
        if crop.width % 4 != 0 {
            return Err(ModelError::InvalidGeometry(format!(
                "crop width {} does not split into two equal even eye regions",
                crop.width
            )));
        }
        if crop.height % 2 != 0 || crop.x % 2 != 0 || crop.y % 2 != 0 {
            return Err(ModelError::InvalidGeometry(format!(
                "crop {} is not aligned to even offsets and height",
                crop
            )));
        }

        Ok(())
    }

    /// Region of the source frame holding the given eye.
    pub fn eye_region(&self, eye: Eye) -> EyeRegion {
        let eye_width = self.crop.width / 2;
        let x = match eye {
            Eye::Left => self.crop.x,
            Eye::Right => self.crop.x + eye_width,
        };
        EyeRegion {
            width: eye_width,
            height: self.crop.height,
            x,
            y: self.crop.y,
        }
    }

    /// Size of one eye after undoing the half-SBS horizontal squeeze.
    pub fn eye_display_size(&self) -> (u32, u32) {
        let region = self.eye_region(Eye::Left);
        match self.geometry {
            SplitGeometry::FullSbs => (region.width, region.height),
            SplitGeometry::HalfSbs => (region.width * 2, region.height),
        }
    }

    /// Total source duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.framerate.frames_to_seconds(self.frame_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_sbs() -> SourceDescriptor {
        SourceDescriptor::new(
            "/media/movie.mkv",
            900,
            Framerate::new(24000, 1001).unwrap(),
            1920,
            1080,
            SplitGeometry::HalfSbs,
        )
    }

    #[test]
    fn parses_rational_framerate() {
        let fps = Framerate::parse("24000/1001").unwrap();
        assert_eq!(fps, Framerate { num: 24000, den: 1001 });
        assert_eq!(fps.to_string(), "24000/1001");
        assert_eq!(fps.rounded(), 24);
    }

    #[test]
    fn parses_integer_and_ntsc_decimals() {
        assert_eq!(Framerate::parse("25").unwrap(), Framerate { num: 25, den: 1 });
        assert_eq!(
            Framerate::parse("23.976").unwrap(),
            Framerate { num: 24000, den: 1001 }
        );
        assert_eq!(
            Framerate::parse("59.94").unwrap(),
            Framerate { num: 60000, den: 1001 }
        );
    }

    #[test]
    fn rejects_inexact_or_zero_framerates() {
        assert!(Framerate::parse("24.5").is_err());
        assert!(Framerate::parse("0/1").is_err());
        assert!(Framerate::parse("24000/0").is_err());
        assert!(Framerate::parse("abc").is_err());
    }

    #[test]
    fn detects_split_geometry_from_aspect() {
        assert_eq!(SplitGeometry::detect(3840, 1080), SplitGeometry::FullSbs);
        assert_eq!(SplitGeometry::detect(1920, 1080), SplitGeometry::HalfSbs);
        assert_eq!("full".parse::<SplitGeometry>().unwrap(), SplitGeometry::FullSbs);
        assert_eq!("Half SBS".parse::<SplitGeometry>().unwrap(), SplitGeometry::HalfSbs);
    }

    #[test]
    fn parses_cropdetect_notation() {
        let crop = CropRect::parse("crop=1920:800:0:140").unwrap();
        assert_eq!(crop, CropRect::new(1920, 800, 0, 140));
        assert!(CropRect::parse("1920:800").is_err());
    }

    #[test]
    fn eye_regions_are_equal_and_adjacent() {
        let source = half_sbs().with_crop(CropRect::new(1920, 800, 0, 140));
        source.validate().unwrap();

        let left = source.eye_region(Eye::Left);
        let right = source.eye_region(Eye::Right);
        assert_eq!((left.width, left.height), (right.width, right.height));
        assert_eq!(left.x, 0);
        assert_eq!(right.x, 960);
        assert_eq!(left.y, 140);
        assert_eq!(source.eye_display_size(), (1920, 800));
    }

    #[test]
    fn full_sbs_keeps_eye_width() {
        let source = SourceDescriptor::new(
            "/media/full.mkv",
            10,
            Framerate::new(24, 1).unwrap(),
            3840,
            1080,
            SplitGeometry::FullSbs,
        );
        assert_eq!(source.eye_display_size(), (1920, 1080));
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let odd = half_sbs().with_crop(CropRect::new(1918, 800, 0, 140));
        assert!(matches!(odd.validate(), Err(ModelError::InvalidGeometry(_))));

        let outside = half_sbs().with_crop(CropRect::new(1920, 1000, 0, 140));
        assert!(matches!(outside.validate(), Err(ModelError::InvalidGeometry(_))));

        let mut empty = half_sbs();
        empty.frame_count = 0;
        assert!(matches!(empty.validate(), Err(ModelError::InvalidSource(_))));
    }
}
