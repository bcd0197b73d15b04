//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while planning or rendering a video.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Inputs rejected before any subprocess was spawned.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A filter graph failed its own consistency checks before execution.
    #[error("Filter graph invariant violated: {0}")]
    GraphInvariant(String),

    #[error("{tool} not found in PATH")]
    ExecutableNotFound { tool: String },

    #[error("FFmpeg rejected the filter graph: {message}")]
    InvalidFilterGraph { message: String, diagnostic: String },

    #[error("FFmpeg disk or I/O failure: {message}")]
    DiskOrIo { message: String, diagnostic: String },

    #[error("FFmpeg failed with exit code {exit_code:?}")]
    UnknownFailure {
        exit_code: Option<i32>,
        diagnostic_tail: String,
    },

    /// FFmpeg reported success but the output is unusable.
    #[error("Output validation failed for {path}: {reason}")]
    OutputValidation { path: PathBuf, reason: String },

    #[error("Probe failed for {path}: {message}")]
    Probe {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a graph invariant error.
    pub fn graph_invariant(message: impl Into<String>) -> Self {
        Self::GraphInvariant(message.into())
    }

    /// Create an executable-not-found error.
    pub fn executable_not_found(tool: impl Into<String>) -> Self {
        Self::ExecutableNotFound { tool: tool.into() }
    }

    /// Create a probe failure error.
    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Create an output validation error.
    pub fn output_validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OutputValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from launching or running the external tool.
    pub fn is_tool_invocation(&self) -> bool {
        matches!(
            self,
            MediaError::ExecutableNotFound { .. }
                | MediaError::InvalidFilterGraph { .. }
                | MediaError::DiskOrIo { .. }
                | MediaError::UnknownFailure { .. }
        )
    }

    /// Whether the failure was raised before any subprocess ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaError::Configuration(_) | MediaError::GraphInvariant(_)
        )
    }

    /// Captured diagnostic text from the external tool, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            MediaError::InvalidFilterGraph { diagnostic, .. }
            | MediaError::DiskOrIo { diagnostic, .. } => Some(diagnostic),
            MediaError::UnknownFailure {
                diagnostic_tail, ..
            } => Some(diagnostic_tail),
            MediaError::Probe { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Short stable label, used for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            MediaError::Configuration(_) => "configuration",
            MediaError::GraphInvariant(_) => "graph_invariant",
            MediaError::ExecutableNotFound { .. } => "executable_not_found",
            MediaError::InvalidFilterGraph { .. } => "invalid_filter_graph",
            MediaError::DiskOrIo { .. } => "disk_or_io",
            MediaError::UnknownFailure { .. } => "unknown_failure",
            MediaError::OutputValidation { .. } => "output_validation",
            MediaError::Probe { .. } => "probe",
            MediaError::FileNotFound(_) => "file_not_found",
            MediaError::Io(_) => "io",
            MediaError::JsonParse(_) => "json_parse",
        }
    }
}
