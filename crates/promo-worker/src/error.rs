//! Worker error types.

use std::fmt;

use thiserror::Error;

use promo_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Pipeline stage a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    Planning,
    Mixing,
    GraphBuilding,
    Execution,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Planning => "planning",
            RenderStage::Mixing => "mixing",
            RenderStage::GraphBuilding => "graph_building",
            RenderStage::Execution => "execution",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Render failed during {stage}: {source}")]
    Stage {
        stage: RenderStage,
        #[source]
        source: MediaError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// Attach the failing stage to a media error.
    pub fn at(stage: RenderStage, source: MediaError) -> Self {
        Self::Stage { stage, source }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn stage(&self) -> Option<RenderStage> {
        match self {
            WorkerError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn media_error(&self) -> Option<&MediaError> {
        match self {
            WorkerError::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the request was rejected before FFmpeg ran.
    pub fn is_validation(&self) -> bool {
        match self {
            WorkerError::ConfigError(_) => true,
            WorkerError::Stage { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

/// Map a media result onto a stage-tagged worker result.
pub trait StageExt<T> {
    fn at_stage(self, stage: RenderStage) -> WorkerResult<T>;
}

impl<T> StageExt<T> for Result<T, MediaError> {
    fn at_stage(self, stage: RenderStage) -> WorkerResult<T> {
        self.map_err(|e| WorkerError::at(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_is_carried() {
        let result: Result<(), MediaError> = Err(MediaError::configuration("no images"));
        let err = result.at_stage(RenderStage::Planning).unwrap_err();
        assert_eq!(err.stage(), Some(RenderStage::Planning));
        assert!(err.is_validation());
        assert!(err.to_string().contains("planning"));
        assert!(matches!(err.media_error(), Some(MediaError::Configuration(_))));
    }

    #[test]
    fn test_execution_failure_is_not_validation() {
        let err = WorkerError::at(
            RenderStage::Execution,
            MediaError::UnknownFailure {
                exit_code: Some(1),
                diagnostic_tail: String::new(),
            },
        );
        assert!(!err.is_validation());
        assert_eq!(err.stage().map(|s| s.as_str()), Some("execution"));
    }

    #[test]
    fn test_mixing_stage_label() {
        let err = WorkerError::at(RenderStage::Mixing, MediaError::configuration("empty bed"));
        assert_eq!(err.stage(), Some(RenderStage::Mixing));
        assert!(err.to_string().starts_with("Render failed during mixing"));
    }
}
