//! FFmpeg process execution for render jobs.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use promo_models::{EncodingConfig, RenderOptions, Resolution};

use crate::command::{resolve_tool, FfmpegCommand, FfmpegInput, FFMPEG};
use crate::error::{MediaError, MediaResult};
use crate::graph::{BuiltGraph, FilterGraph};
use crate::probe::VideoInfo;
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};
use crate::timeline::DURATION_TOLERANCE_SECS;

/// Diagnostic stderr lines kept for error reports.
pub const DIAGNOSTIC_TAIL_LINES: usize = 40;

const FILTER_GRAPH_PATTERNS: &[&str] = &[
    "Error initializing complex filters",
    "No such filter",
    "matches no streams",
    "Failed to configure",
    "Error reinitializing filters",
    "Output pad",
    "Invalid stream specifier",
    "Error parsing filterchain",
    "Unable to parse option value",
];

const DISK_IO_PATTERNS: &[&str] = &[
    "No space left on device",
    "Permission denied",
    "No such file or directory",
    "Input/output error",
    "Read-only file system",
    "Disk quota exceeded",
];

/// Everything FFmpeg needs to render one video.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Inputs in positional order
    pub inputs: Vec<FfmpegInput>,
    pub filter_graph: FilterGraph,
    pub output_path: PathBuf,
    pub resolution: Resolution,
    pub fps: u32,
    pub encoding: EncodingConfig,
    /// Output length in seconds
    pub total_duration: f64,
}

impl RenderJob {
    pub fn new(built: BuiltGraph, output_path: impl Into<PathBuf>, options: &RenderOptions) -> Self {
        Self {
            inputs: built.inputs.into_inputs(),
            filter_graph: built.graph,
            output_path: output_path.into(),
            resolution: options.resolution.even(),
            // Same floor as the graph builder's fps filter.
            fps: options.fps.max(1),
            encoding: EncodingConfig::for_quality(options.quality),
            total_duration: built.total_duration,
        }
    }

    pub fn total_duration_ms(&self) -> i64 {
        (self.total_duration * 1000.0).round() as i64
    }

    /// FFmpeg invocation with inputs in the exact order they were planned.
    pub fn to_command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.output_path)
            .inputs(self.inputs.iter().cloned())
            .filter_complex(self.filter_graph.to_filter_complex());

        for label in self.filter_graph.outputs() {
            cmd = cmd.map(format!("[{}]", label));
        }

        cmd.output_args(["-r".to_string(), self.fps.to_string()])
            .output_args(self.encoding.to_ffmpeg_args())
            .duration(self.total_duration)
    }
}

/// Map a failed FFmpeg run onto the error taxonomy using its stderr.
pub fn classify_failure(exit_code: Option<i32>, diagnostic_tail: &str) -> MediaError {
    let matching_line = |patterns: &[&str]| {
        diagnostic_tail
            .lines()
            .find(|line| patterns.iter().any(|p| line.contains(p)))
            .map(|line| line.trim().to_string())
    };
    let invalid_argument_in_filter = diagnostic_tail.lines().find(|line| {
        line.contains("Invalid argument") && (line.contains("filter") || line.contains("Parsed_"))
    });

    if let Some(message) = matching_line(FILTER_GRAPH_PATTERNS)
        .or_else(|| invalid_argument_in_filter.map(|l| l.trim().to_string()))
    {
        return MediaError::InvalidFilterGraph {
            message,
            diagnostic: diagnostic_tail.to_string(),
        };
    }

    if let Some(message) = matching_line(DISK_IO_PATTERNS) {
        return MediaError::DiskOrIo {
            message,
            diagnostic: diagnostic_tail.to_string(),
        };
    }

    MediaError::UnknownFailure {
        exit_code,
        diagnostic_tail: diagnostic_tail.to_string(),
    }
}

/// Check that FFmpeg left a non-empty file behind.
pub async fn validate_output(path: &Path) -> MediaResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(MediaError::output_validation(path, "output file is empty")),
        Err(e) => Err(MediaError::output_validation(
            path,
            format!("output file missing: {}", e),
        )),
    }
}

/// Compare a probed render against its planned length.
pub fn check_rendered_duration(path: &Path, info: &VideoInfo, expected: f64) -> MediaResult<()> {
    let drift = (info.duration - expected).abs();
    if drift > DURATION_TOLERANCE_SECS {
        return Err(MediaError::output_validation(
            path,
            format!(
                "rendered {:.3}s, planned {:.3}s (off by {:.3}s)",
                info.duration, expected, drift
            ),
        ));
    }
    Ok(())
}

/// Runs FFmpeg child processes.
///
/// Children are spawned with `kill_on_drop`, so dropping an in-flight
/// future terminates the process. There is no timeout or retry.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    ffmpeg: String,
    tail_lines: usize,
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new(FFMPEG)
    }
}

impl FfmpegExecutor {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            tail_lines: DIAGNOSTIC_TAIL_LINES,
        }
    }

    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines.max(1);
        self
    }

    pub fn ffmpeg(&self) -> &str {
        &self.ffmpeg
    }

    /// Render a job.
    pub async fn execute(&self, job: &RenderJob) -> MediaResult<PathBuf> {
        self.execute_with_progress(job, |_| {}).await
    }

    /// Render a job, reporting progress snapshots.
    pub async fn execute_with_progress<F>(&self, job: &RenderJob, progress_callback: F) -> MediaResult<PathBuf>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        job.filter_graph.validate(job.inputs.len())?;

        let started = Instant::now();
        info!(
            input_count = job.inputs.len(),
            output = %job.output_path.display(),
            total_secs = job.total_duration,
            "Starting FFmpeg render"
        );

        let result = self.run_with_progress(&job.to_command(), progress_callback).await;
        let result = match result {
            Ok(()) => validate_output(&job.output_path).await.map(|bytes| {
                info!(
                    output = %job.output_path.display(),
                    bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "FFmpeg render finished"
                );
                job.output_path.clone()
            }),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            metrics::counter!("promo_ffmpeg_failures_total", "kind" => e.kind_label()).increment(1);
        }
        result
    }

    /// Run any FFmpeg command without progress reporting.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run any FFmpeg command, classifying failures from its stderr.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let bin = resolve_tool(&self.ffmpeg)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", bin.display(), args.join(" "));

        let mut child = Command::new(&bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("stderr not captured")))?;
        let mut reader = BufReader::new(stderr).lines();
        let tail_limit = self.tail_lines;

        let stderr_task = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(tail_limit);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(snapshot) = parse_progress_line(&line, &mut current) {
                        progress_callback(snapshot);
                    }
                    continue;
                }
                if tail.len() == tail_limit {
                    tail.pop_front();
                }
                tail.push_back(line);
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = child.wait().await?;
        let diagnostic_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let err = classify_failure(status.code(), &diagnostic_tail);
        warn!(
            exit_code = ?status.code(),
            kind = err.kind_label(),
            "FFmpeg exited with failure"
        );
        Err(err)
    }
}
