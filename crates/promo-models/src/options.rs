//! Render options accepted from callers.
//!
//! Keys follow the camelCase names used by the upstream collaborators.
//! Volume and duration fields are parsed leniently: anything that is not a
//! finite number is treated as "not provided" and replaced downstream by the
//! documented default.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default output resolution.
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 30;
/// Default crossfade between product images, in seconds.
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;
/// Default pad color behind letterboxed images.
pub const DEFAULT_BACKGROUND_COLOR: &str = "black";

/// Errors parsing a resolution string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Resolution must look like WIDTHxHEIGHT, got '{0}'")]
    Malformed(String),

    #[error("Resolution dimensions must be positive, got '{0}'")]
    Zero(String),
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round both dimensions down to even values (required by yuv420p).
    pub fn even(self) -> Self {
        Self {
            width: (self.width / 2).max(1) * 2,
            height: (self.height / 2).max(1) * 2,
        }
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (w, h) = trimmed
            .split_once(['x', 'X'])
            .ok_or_else(|| ResolutionError::Malformed(s.to_string()))?;

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| ResolutionError::Malformed(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| ResolutionError::Malformed(s.to_string()))?;

        if width == 0 || height == 0 {
            return Err(ResolutionError::Zero(s.to_string()));
        }

        Ok(Self { width, height })
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Output quality: a named preset or a raw CRF factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityPreset {
    Draft,
    #[default]
    Standard,
    High,
    Ultra,
    /// Explicit constant rate factor (0-51)
    Crf(u8),
}

impl QualityPreset {
    /// Encoder CRF and x264 preset for this quality.
    pub fn crf_and_preset(&self) -> (u8, &'static str) {
        match self {
            QualityPreset::Draft => (28, "veryfast"),
            QualityPreset::Standard => (23, "medium"),
            QualityPreset::High => (20, "slow"),
            QualityPreset::Ultra => (17, "slower"),
            QualityPreset::Crf(crf) => ((*crf).min(51), "medium"),
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            QualityPreset::Draft => Some("draft"),
            QualityPreset::Standard => Some("standard"),
            QualityPreset::High => Some("high"),
            QualityPreset::Ultra => Some("ultra"),
            QualityPreset::Crf(_) => None,
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" | "low" | "fast" => Ok(QualityPreset::Draft),
            "standard" | "medium" | "normal" => Ok(QualityPreset::Standard),
            "high" => Ok(QualityPreset::High),
            "ultra" | "best" => Ok(QualityPreset::Ultra),
            other => other
                .parse::<f64>()
                .ok()
                .and_then(crf_from_number)
                .ok_or_else(|| format!("Unknown quality preset '{}'", s)),
        }
    }
}

fn crf_from_number(n: f64) -> Option<QualityPreset> {
    if n.is_finite() && (0.0..=51.0).contains(&n) {
        Some(QualityPreset::Crf(n.round() as u8))
    } else {
        None
    }
}

impl Serialize for QualityPreset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QualityPreset::Crf(crf) => serializer.serialize_u8(*crf),
            named => serializer.serialize_str(named.name().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for QualityPreset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawQuality {
            Factor(f64),
            Name(String),
        }

        match RawQuality::deserialize(deserializer)? {
            RawQuality::Factor(n) => crf_from_number(n).ok_or_else(|| {
                serde::de::Error::custom(format!("Quality factor {} outside 0-51", n))
            }),
            RawQuality::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Accept any JSON value; keep it only when it is a finite number
/// (or a string holding one).
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

/// Intro/outro card settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntroOutroOptions {
    #[serde(default, deserialize_with = "lenient_number")]
    pub intro_duration: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub outro_duration: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub intro_volume: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub outro_volume: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_image_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outro_image_path: Option<PathBuf>,

    /// Show the full-size scannable code on the outro card
    #[serde(default, rename = "enableQROutro")]
    pub enable_qr_outro: bool,
}

/// Options for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    #[serde(default)]
    #[schemars(with = "String")]
    pub resolution: Resolution,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Preset name ("draft", "standard", "high", "ultra") or CRF number
    #[serde(default)]
    #[schemars(with = "serde_json::Value")]
    pub quality: QualityPreset,

    #[serde(default = "default_true")]
    pub enable_background_music: bool,

    #[serde(default)]
    pub enable_intro_outro: bool,

    #[serde(default)]
    pub intro_outro_options: IntroOutroOptions,

    #[serde(default, rename = "enableSmallQROverlay")]
    pub enable_small_qr_overlay: bool,

    /// Text encoded into the scannable code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_payload: Option<String>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub voice_volume: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub background_volume: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub fade_duration: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub transition_duration: Option<f64>,

    #[serde(default = "default_background_color")]
    pub background_color: String,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_true() -> bool {
    true
}
fn default_background_color() -> String {
    DEFAULT_BACKGROUND_COLOR.to_string()
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            fps: DEFAULT_FPS,
            quality: QualityPreset::default(),
            enable_background_music: true,
            enable_intro_outro: false,
            intro_outro_options: IntroOutroOptions::default(),
            enable_small_qr_overlay: false,
            overlay_payload: None,
            voice_volume: None,
            background_volume: None,
            fade_duration: None,
            transition_duration: None,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
        }
    }
}

impl RenderOptions {
    /// Payload for the scannable code, when a non-blank one was given.
    pub fn payload(&self) -> Option<&str> {
        self.overlay_payload
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Whether the corner badge is requested and has something to show.
    pub fn wants_corner_overlay(&self) -> bool {
        self.enable_small_qr_overlay && self.payload().is_some()
    }

    /// Whether the outro should carry the full-size code.
    pub fn wants_outro_code(&self) -> bool {
        self.enable_intro_outro
            && self.intro_outro_options.enable_qr_outro
            && self.payload().is_some()
    }

    /// Transition overlap, falling back to the default for unusable input.
    pub fn transition_seconds(&self) -> f64 {
        self.transition_duration
            .filter(|d| *d >= 0.0)
            .unwrap_or(DEFAULT_TRANSITION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse() {
        let r: Resolution = "1080x1920".parse().unwrap();
        assert_eq!(r, Resolution::new(1080, 1920));
        assert!(r.is_portrait());

        assert!(matches!("1920".parse::<Resolution>(), Err(ResolutionError::Malformed(_))));
        assert!(matches!("0x1080".parse::<Resolution>(), Err(ResolutionError::Zero(_))));
        assert_eq!(Resolution::new(1279, 721).even(), Resolution::new(1278, 720));
    }

    #[test]
    fn test_quality_from_name_or_number() {
        let q: QualityPreset = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(q, QualityPreset::High);

        let q: QualityPreset = serde_json::from_str("26").unwrap();
        assert_eq!(q, QualityPreset::Crf(26));

        assert!(serde_json::from_str::<QualityPreset>("\"cinematic\"").is_err());
        assert!(serde_json::from_str::<QualityPreset>("99").is_err());
    }

    #[test]
    fn test_options_defaults_from_empty_json() {
        let opts: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, RenderOptions::default());
        assert!(opts.enable_background_music);
        assert_eq!(opts.fps, 30);
    }

    #[test]
    fn test_options_camel_case_keys() {
        let json = r#"{
            "resolution": "1080x1920",
            "fps": 25,
            "quality": "draft",
            "enableBackgroundMusic": false,
            "enableIntroOutro": true,
            "introOutroOptions": {
                "introDuration": 3,
                "outroVolume": "0.25",
                "enableQROutro": true
            },
            "enableSmallQROverlay": true,
            "overlayPayload": "https://shop.example/p/42"
        }"#;

        let opts: RenderOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.resolution, Resolution::new(1080, 1920));
        assert_eq!(opts.fps, 25);
        assert!(!opts.enable_background_music);
        assert_eq!(opts.intro_outro_options.intro_duration, Some(3.0));
        assert_eq!(opts.intro_outro_options.outro_volume, Some(0.25));
        assert!(opts.wants_corner_overlay());
        assert!(opts.wants_outro_code());
    }

    #[test]
    fn test_non_numeric_volumes_become_none() {
        let json = r#"{"voiceVolume": "loud", "backgroundVolume": null,
                       "introOutroOptions": {"introVolume": [1], "introDuration": -1}}"#;
        let opts: RenderOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.voice_volume, None);
        assert_eq!(opts.background_volume, None);
        assert_eq!(opts.intro_outro_options.intro_volume, None);
        // Negative durations survive parsing; the planner replaces them.
        assert_eq!(opts.intro_outro_options.intro_duration, Some(-1.0));
    }

    #[test]
    fn test_blank_payload_disables_overlay() {
        let opts = RenderOptions {
            enable_small_qr_overlay: true,
            overlay_payload: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!opts.wants_corner_overlay());
    }
}
