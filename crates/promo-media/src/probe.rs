//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::{resolve_tool, FFPROBE};
use crate::error::{MediaError, MediaResult};

/// Audio file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub channels: u32,
    pub codec: String,
}

/// Video file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Whether an audio stream is present
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Run ffprobe and return its raw JSON output.
async fn run_ffprobe(ffprobe: &str, path: &Path) -> MediaResult<Vec<u8>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let bin = resolve_tool(ffprobe)?;

    let output = Command::new(bin)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::probe(
            path,
            format!("ffprobe exited with {:?}", output.status.code()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    Ok(output.stdout)
}

fn parse_output(path: &Path, json: &[u8]) -> MediaResult<FfprobeOutput> {
    serde_json::from_slice(json)
        .map_err(|e| MediaError::probe(path, format!("unreadable ffprobe output: {}", e), None))
}

fn parse_number<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

/// Extract audio information from ffprobe JSON.
pub fn parse_audio_info(path: &Path, json: &[u8]) -> MediaResult<AudioInfo> {
    let probe = parse_output(path, json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| MediaError::probe(path, "no audio stream found", None))?;

    let duration = parse_number::<f64>(probe.format.duration.as_ref())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::probe(path, "duration unavailable", None))?;

    let bitrate = parse_number(stream.bit_rate.as_ref())
        .or_else(|| parse_number(probe.format.bit_rate.as_ref()))
        .unwrap_or(0);

    Ok(AudioInfo {
        duration,
        bitrate,
        sample_rate: parse_number(stream.sample_rate.as_ref()).unwrap_or(0),
        channels: stream.channels.unwrap_or(0),
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Extract video information from ffprobe JSON.
pub fn parse_video_info(path: &Path, json: &[u8]) -> MediaResult<VideoInfo> {
    let probe = parse_output(path, json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::probe(path, "no video stream found", None))?;

    let fps = video
        .avg_frame_rate
        .as_ref()
        .or(video.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration: parse_number(probe.format.duration.as_ref()).unwrap_or(0.0),
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        size: parse_number(probe.format.size.as_ref()).unwrap_or(0),
    })
}

/// Probe an audio file with the default ffprobe.
pub async fn probe_audio(path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    probe_audio_with(FFPROBE, path).await
}

/// Probe an audio file with an explicit ffprobe binary.
pub async fn probe_audio_with(ffprobe: &str, path: impl AsRef<Path>) -> MediaResult<AudioInfo> {
    let path = path.as_ref();
    let json = run_ffprobe(ffprobe, path).await?;
    parse_audio_info(path, &json)
}

/// Probe a rendered video with an explicit ffprobe binary.
pub async fn probe_video_with(ffprobe: &str, path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    let json = run_ffprobe(ffprobe, path).await?;
    parse_video_info(path, &json)
}

/// Get audio duration in seconds.
pub async fn get_duration(ffprobe: &str, path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_audio_with(ffprobe, path).await?.duration)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
