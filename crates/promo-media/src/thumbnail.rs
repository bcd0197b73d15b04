//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::error::MediaResult;
use crate::executor::{validate_output, FfmpegExecutor};
use crate::filters::filter_thumbnail;
use promo_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_TIMESTAMP};

/// Build the command extracting one scaled frame from a rendered video.
pub fn thumbnail_command(video_path: &Path, output_path: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output_path)
        .without_progress()
        .input(FfmpegInput::file(video_path).with_args(["-ss", THUMBNAIL_TIMESTAMP]))
        .single_frame()
        .video_filter(filter_thumbnail(THUMBNAIL_SCALE_WIDTH))
}

/// Generate a thumbnail from a video file.
pub async fn generate_thumbnail(
    executor: &FfmpegExecutor,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    executor
        .run(&thumbnail_command(video_path.as_ref(), output_path))
        .await?;
    validate_output(output_path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_command() {
        let args = thumbnail_command(Path::new("promo.mp4"), Path::new("thumb.jpg")).build_args();
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "promo.mp4").unwrap();
        assert!(seek < input);
        assert!(args.contains(&"scale=480:-2".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "1"));
        assert_eq!(args.last().unwrap(), "thumb.jpg");
    }
}
