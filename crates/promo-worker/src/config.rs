//! Worker configuration.

use std::path::PathBuf;

use promo_media::command::{FFMPEG, FFPROBE};
use promo_media::mixer::VolumeLimits;
use promo_media::ToolPaths;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for session-scoped intermediate and output files
    pub work_dir: PathBuf,
    /// Background music library; `None` disables background music
    pub music_dir: Option<PathBuf>,
    /// FFmpeg executable name or path
    pub ffmpeg_bin: String,
    /// FFprobe executable name or path
    pub ffprobe_bin: String,
    /// Maximum FFmpeg renders running at once
    pub max_concurrent_renders: usize,
    /// Extract a thumbnail after each successful render
    pub generate_thumbnails: bool,
    /// Per-role volume ceilings handed to the mixer
    pub volume_limits: VolumeLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/promo"),
            music_dir: None,
            ffmpeg_bin: FFMPEG.to_string(),
            ffprobe_bin: FFPROBE.to_string(),
            max_concurrent_renders: 2,
            generate_thumbnails: true,
            volume_limits: VolumeLimits::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            work_dir: non_empty("PROMO_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            music_dir: non_empty("PROMO_MUSIC_DIR").map(PathBuf::from),
            ffmpeg_bin: non_empty("PROMO_FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: non_empty("PROMO_FFPROBE_BIN").unwrap_or(defaults.ffprobe_bin),
            max_concurrent_renders: non_empty("PROMO_MAX_CONCURRENT_RENDERS")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_renders),
            generate_thumbnails: non_empty("PROMO_THUMBNAILS")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.generate_thumbnails),
            volume_limits: defaults.volume_limits,
        }
    }

    pub fn tools(&self) -> ToolPaths {
        ToolPaths::new(&self.ffmpeg_bin, &self.ffprobe_bin)
    }
}
