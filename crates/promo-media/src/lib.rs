#![deny(unreachable_patterns)]
//! Audio-visual composition engine for promo slideshows.
//!
//! This crate provides:
//! - Timeline planning for intro, product images and outro
//! - Audio mixing with per-role volume limits and clipping analysis
//! - Typed FFmpeg filter graph construction and validation
//! - FFmpeg execution with `-progress pipe:2` parsing and failure classification
//! - Session-scoped asset naming, probing, thumbnails and code images

pub mod code_image;
pub mod command;
pub mod error;
pub mod executor;
pub mod filters;
pub mod graph;
pub mod mixer;
pub mod probe;
pub mod progress;
pub mod resolver;
pub mod thumbnail;
pub mod timeline;

pub use code_image::{CodeImageRenderer, FfmpegCodeRenderer};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, ToolPaths};
pub use error::{MediaError, MediaResult};
pub use executor::{check_rendered_duration, classify_failure, FfmpegExecutor, RenderJob};
pub use graph::{BuiltGraph, FilterGraph, FilterNode, GraphBuilder, GraphSources, InputList, InputRole, Pin};
pub use mixer::{
    analyze_audio_file, AudioAnalysis, AudioMixer, AudioQuality, ClippingReport, MixVolumes,
    RequestedVolumes, VolumeLimits,
};
pub use probe::{get_duration, probe_audio, probe_audio_with, probe_video_with, AudioInfo, VideoInfo};
pub use progress::FfmpegProgress;
pub use resolver::{parse_session_id, select_background_music, AssetResolver};
pub use thumbnail::generate_thumbnail;
pub use timeline::{fade_out_start, plan_timeline, CardTiming, ImageDuration, Timeline, TimelineRequest};
