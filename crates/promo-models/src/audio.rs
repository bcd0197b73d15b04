//! Audio track models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Role an audio track plays in the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    /// Narration, active during the main segment
    Voice,
    /// Music bed under the narration
    Background,
    /// Music level while the intro card is shown
    Intro,
    /// Music level while the outro card is shown
    Outro,
}

impl AudioRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioRole::Voice => "voice",
            AudioRole::Background => "background",
            AudioRole::Intro => "intro",
            AudioRole::Outro => "outro",
        }
    }
}

impl fmt::Display for AudioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audio stream feeding the mix.
///
/// `target_volume` is expected to already be normalized by the mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioTrack {
    pub role: AudioRole,
    pub path: PathBuf,
    pub target_volume: f64,
    /// Fade-in length in seconds
    #[serde(default)]
    pub fade_in: f64,
    /// Fade-out length in seconds
    #[serde(default)]
    pub fade_out: f64,
}

impl AudioTrack {
    pub fn new(role: AudioRole, path: impl Into<PathBuf>, target_volume: f64) -> Self {
        Self {
            role,
            path: path.into(),
            target_volume,
            fade_in: 0.0,
            fade_out: 0.0,
        }
    }

    pub fn with_fades(mut self, fade_in: f64, fade_out: f64) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }
}
