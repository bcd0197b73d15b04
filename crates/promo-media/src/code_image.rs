//! Scannable-code image rendering.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::error::{MediaError, MediaResult};
use crate::executor::{validate_output, FfmpegExecutor};
use crate::filters::escape_filter_value;

/// Default edge length of the rendered code in pixels.
pub const DEFAULT_CODE_SIZE: u32 = 512;

/// Produces a square image encoding `payload`.
#[async_trait]
pub trait CodeImageRenderer: Send + Sync {
    async fn render(&self, payload: &str, output: &Path) -> MediaResult<PathBuf>;
}

/// Renders codes through FFmpeg's `qrencodesrc` source.
#[derive(Debug, Clone)]
pub struct FfmpegCodeRenderer {
    executor: FfmpegExecutor,
    size: u32,
}

impl FfmpegCodeRenderer {
    pub fn new(executor: FfmpegExecutor) -> Self {
        Self {
            executor,
            size: DEFAULT_CODE_SIZE,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(64);
        self
    }

    /// Lavfi source description for `payload`. The text is escaped, not quoted.
    pub fn source(&self, payload: &str) -> String {
        format!(
            "qrencodesrc=text={}:q={}:level=M:background_color=white:foreground_color=black",
            escape_filter_value(payload),
            self.size
        )
    }
}

#[async_trait]
impl CodeImageRenderer for FfmpegCodeRenderer {
    async fn render(&self, payload: &str, output: &Path) -> MediaResult<PathBuf> {
        if payload.trim().is_empty() {
            return Err(MediaError::configuration("Code payload is empty"));
        }

        let cmd = FfmpegCommand::new(output)
            .without_progress()
            .input(FfmpegInput::lavfi(self.source(payload.trim())))
            .single_frame();

        debug!(output = %output.display(), size = self.size, "Rendering code image");
        self.executor.run(&cmd).await?;
        validate_output(output).await?;
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_escapes_payload() {
        let renderer = FfmpegCodeRenderer::new(FfmpegExecutor::default());
        let source = renderer.source("https://shop.example/p?id=1,2");
        assert!(source.starts_with(r"qrencodesrc=text=https\\://shop.example/p?id=1\,2:q=512:"));
    }

    #[test]
    fn test_source_survives_quotes() {
        let renderer = FfmpegCodeRenderer::new(FfmpegExecutor::default());
        let source = renderer.source("it's on sale");
        assert!(source.starts_with(r"qrencodesrc=text=it\\\'s on sale:q=512:"));
        assert!(!source.contains("text='"));
    }

    #[test]
    fn test_minimum_size() {
        let renderer = FfmpegCodeRenderer::new(FfmpegExecutor::default()).with_size(8);
        assert!(renderer.source("x").contains(":q=64:"));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let renderer = FfmpegCodeRenderer::new(FfmpegExecutor::default());
        let err = renderer.render("   ", Path::new("/tmp/code.png")).await.unwrap_err();
        assert!(matches!(err, MediaError::Configuration(_)));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg built with libqrencode"]
    async fn test_renders_png() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("code.png");
        let renderer = FfmpegCodeRenderer::new(FfmpegExecutor::default());
        renderer.render("https://example.com", &out).await.unwrap();
        assert!(out.exists());
    }
}
