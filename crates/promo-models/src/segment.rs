//! Timeline segment models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a timeline segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Intro,
    Main,
    Outro,
}

/// Where the scannable-code payload may be drawn for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPlacement {
    /// Nothing drawn
    Hidden,
    /// Small persistent badge in a corner
    Corner,
    /// Dedicated full-size rendition, centered
    FullFrame,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Intro => "intro",
            SegmentKind::Main => "main",
            SegmentKind::Outro => "outro",
        }
    }

    /// Overlay eligibility depends on the segment kind only.
    ///
    /// No kind maps to both placements, so the corner badge and the
    /// full-size rendition never share a frame.
    pub fn overlay_placement(&self) -> OverlayPlacement {
        match self {
            SegmentKind::Intro => OverlayPlacement::Hidden,
            SegmentKind::Main => OverlayPlacement::Corner,
            SegmentKind::Outro => OverlayPlacement::FullFrame,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crossfade into the following segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    /// FFmpeg xfade transition name
    pub name: String,
    /// Overlap in seconds
    pub duration: f64,
}

impl Transition {
    pub fn crossfade(duration: f64) -> Self {
        Self {
            name: "fade".to_string(),
            duration,
        }
    }
}

/// A time-bounded, kind-tagged portion of the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub kind: SegmentKind,

    /// Effective contribution to the output timeline in seconds.
    ///
    /// Segment durations always sum to the rendered length.
    pub duration_seconds: f64,

    /// Music level while this segment plays
    pub volume_level: f64,

    /// Indices into the ordered product image list
    #[serde(default)]
    pub image_refs: Vec<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_to_next: Option<Transition>,
}

impl Segment {
    pub fn new(kind: SegmentKind, duration_seconds: f64, volume_level: f64) -> Self {
        Self {
            kind,
            duration_seconds,
            volume_level,
            image_refs: Vec::new(),
            transition_to_next: None,
        }
    }

    pub fn with_images(mut self, refs: Vec<usize>) -> Self {
        self.image_refs = refs;
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition_to_next = Some(transition);
        self
    }

    /// Length of the source stream feeding this segment.
    ///
    /// Longer than `duration_seconds` when the segment crossfades into the
    /// next one, since the overlap is shared between both streams.
    pub fn clip_seconds(&self) -> f64 {
        self.duration_seconds
            + self
                .transition_to_next
                .as_ref()
                .map(|t| t.duration)
                .unwrap_or(0.0)
    }
}
