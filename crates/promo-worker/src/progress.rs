//! Progress fan-out to UI/CLI consumers.

use tokio::sync::mpsc;
use tracing::trace;

use promo_models::{RenderProgress, RenderStep};

/// Non-blocking progress sender.
///
/// Updates are dropped when the channel is full or closed; rendering
/// never waits on a slow consumer.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<RenderProgress>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<RenderProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Reporter that discards every update.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Bounded channel plus a reporter feeding it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RenderProgress>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn report(&self, step: RenderStep, percent: u8, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            if tx.try_send(RenderProgress::new(step, percent, message)).is_err() {
                trace!(step = step.as_str(), "Dropped progress update");
            }
        }
    }

    /// Map FFmpeg's render percentage into the `[from, to]` band.
    pub fn rendering(&self, render_percent: f64, from: u8, to: u8) {
        let span = to.saturating_sub(from) as f64;
        let percent = from as f64 + span * (render_percent.clamp(0.0, 100.0) / 100.0);
        self.report(
            RenderStep::Rendering,
            percent.round() as u8,
            format!("Rendering video ({:.0}%)", render_percent),
        );
    }

    pub fn done(&self, message: impl Into<String>) {
        self.report(RenderStep::Done, 100, message);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.report(RenderStep::Failed, 100, message);
    }
}
