//! Shared data models for the promo slideshow renderer.
//!
//! This crate provides Serde-serializable types for:
//! - Media assets handed over by upstream collaborators
//! - Timeline segments and audio tracks
//! - Render options and encoding configuration
//! - Per-run session identifiers
//! - Progress notifications

pub mod asset;
pub mod audio;
pub mod encoding;
pub mod options;
pub mod progress;
pub mod segment;
pub mod session;

// Re-export common types
pub use asset::{MediaAsset, MediaKind};
pub use audio::{AudioRole, AudioTrack};
pub use encoding::EncodingConfig;
pub use options::{IntroOutroOptions, QualityPreset, RenderOptions, Resolution, ResolutionError};
pub use progress::{RenderProgress, RenderStep};
pub use segment::{OverlayPlacement, Segment, SegmentKind, Transition};
pub use session::SessionId;
