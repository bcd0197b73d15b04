//! Render progress notifications.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline step a progress notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderStep {
    /// Resolving session paths and optional assets
    ResolvingAssets,
    /// Probing narration and music
    AnalyzingAudio,
    /// Computing segment timing
    Planning,
    /// Normalizing volumes and building the audio chain
    Mixing,
    /// Assembling the filter graph
    BuildingGraph,
    /// FFmpeg is encoding
    Rendering,
    /// Extracting a preview still
    Thumbnail,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed,
}

impl RenderStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStep::ResolvingAssets => "resolving_assets",
            RenderStep::AnalyzingAudio => "analyzing_audio",
            RenderStep::Planning => "planning",
            RenderStep::Mixing => "mixing",
            RenderStep::BuildingGraph => "building_graph",
            RenderStep::Rendering => "rendering",
            RenderStep::Thumbnail => "thumbnail",
            RenderStep::Done => "done",
            RenderStep::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStep::Done | RenderStep::Failed)
    }
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderProgress {
    pub step: RenderStep,
    /// Overall completion, 0-100
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RenderProgress {
    pub fn new(step: RenderStep, percent: u8, message: impl Into<String>) -> Self {
        Self {
            step,
            percent: percent.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_capped() {
        let p = RenderProgress::new(RenderStep::Rendering, 140, "encoding");
        assert_eq!(p.percent, 100);
    }

    #[test]
    fn test_step_serialization() {
        let json = serde_json::to_string(&RenderStep::BuildingGraph).unwrap();
        assert_eq!(json, "\"building_graph\"");
        assert!(RenderStep::Failed.is_terminal());
        assert!(!RenderStep::Rendering.is_terminal());
    }
}
