//! Promo video render worker.
//!
//! This crate provides:
//! - The render pipeline tying planning, mixing, graph building and FFmpeg together
//! - Environment-driven configuration
//! - Structured render logging and progress fan-out

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod progress;

pub use config::WorkerConfig;
pub use error::{RenderStage, WorkerError, WorkerResult};
pub use logging::RenderLogger;
pub use pipeline::{RenderOutcome, RenderPipeline, RenderRequest};
pub use progress::ProgressReporter;
