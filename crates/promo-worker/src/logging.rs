//! Structured render logging utilities.

use tracing::{error, info, warn, Span};

use promo_models::SessionId;

/// Logs render lifecycle events with the session id attached.
#[derive(Debug, Clone)]
pub struct RenderLogger {
    session_id: String,
    operation: String,
}

impl RenderLogger {
    pub fn new(session_id: &SessionId, operation: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Render started: {}", message
        );
    }

    pub fn log_progress(&self, stage: &str, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            stage,
            "Render progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Render warning: {}", message
        );
    }

    pub fn log_error(&self, stage: &str, message: &str) {
        error!(
            session_id = %self.session_id,
            operation = %self.operation,
            stage,
            "Render error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Render completed: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the session id for nested events.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "render",
            session_id = %self.session_id,
            operation = %self.operation
        )
    }
}
