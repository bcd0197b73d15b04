//! Render pipeline: assets → timeline + mix → graph → FFmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::Instrument;

use promo_media::code_image::{CodeImageRenderer, FfmpegCodeRenderer};
use promo_media::executor::{check_rendered_duration, FfmpegExecutor, RenderJob};
use promo_media::graph::{GraphBuilder, GraphSources};
use promo_media::mixer::{
    analyze_audio_file, AudioMixer, AudioQuality, ClippingReport, RequestedVolumes, ALL_WINDOWS,
};
use promo_media::probe::{get_duration, probe_video_with};
use promo_media::resolver::{select_background_music, AssetResolver};
use promo_media::thumbnail::generate_thumbnail;
use promo_media::timeline::{plan_timeline, CardTiming, ImageDuration, TimelineRequest};
use promo_media::{MediaError, MixVolumes};
use promo_models::{AudioRole, AudioTrack, MediaAsset, RenderOptions, RenderStep, SegmentKind, SessionId};

use crate::config::WorkerConfig;
use crate::error::{RenderStage, StageExt, WorkerError, WorkerResult};
use crate::logging::RenderLogger;
use crate::progress::ProgressReporter;

/// Share of overall progress reserved for the FFmpeg run.
const RENDER_PROGRESS_BAND: (u8, u8) = (40, 95);

/// One render invocation as handed over by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Ordered product images
    pub images: Vec<PathBuf>,
    /// Audio files; the first one is the narration
    pub audio: Vec<PathBuf>,
    /// Explicit background track, bypassing the music library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<PathBuf>,
    /// Fixed time per image instead of following the narration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_image_seconds: Option<f64>,
    /// Output file; defaults to a session-scoped path in the work dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn assets(&self) -> Vec<MediaAsset> {
        self.images
            .iter()
            .map(MediaAsset::image)
            .chain(self.audio.iter().map(MediaAsset::audio))
            .chain(self.background_music.iter().map(MediaAsset::audio))
            .collect()
    }

    pub fn voiceover(&self) -> Option<&Path> {
        self.audio.first().map(PathBuf::as_path)
    }
}

/// What a successful render produced.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub session_id: SessionId,
    pub output_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    /// Planned output length in seconds
    pub duration_seconds: f64,
    /// Advisory clipping analysis of the requested volumes
    pub clipping: ClippingReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_quality: Option<AudioQuality>,
    pub background_music: Option<PathBuf>,
}

/// Drives complete renders. Cheap to clone; clones share the concurrency limit.
#[derive(Clone)]
pub struct RenderPipeline {
    config: WorkerConfig,
    mixer: AudioMixer,
    executor: FfmpegExecutor,
    code_renderer: Arc<dyn CodeImageRenderer>,
    render_slots: Arc<Semaphore>,
}

impl RenderPipeline {
    pub fn new(config: WorkerConfig) -> Self {
        let executor = FfmpegExecutor::new(&config.ffmpeg_bin);
        Self {
            mixer: AudioMixer::new(config.volume_limits),
            code_renderer: Arc::new(FfmpegCodeRenderer::new(executor.clone())),
            render_slots: Arc::new(Semaphore::new(config.max_concurrent_renders.max(1))),
            executor,
            config,
        }
    }

    pub fn with_code_renderer(mut self, renderer: Arc<dyn CodeImageRenderer>) -> Self {
        self.code_renderer = renderer;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Render one promo video.
    pub async fn render(&self, request: RenderRequest, progress: &ProgressReporter) -> WorkerResult<RenderOutcome> {
        let resolver = AssetResolver::new(&self.config.work_dir);
        let logger = RenderLogger::new(resolver.session(), "slideshow");
        let started = Instant::now();

        let result = self
            .render_session(&request, &resolver, &logger, progress)
            .instrument(logger.create_span())
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!("promo_render_duration_seconds").record(elapsed);

        match &result {
            Ok(outcome) => {
                metrics::counter!("promo_renders_total", "result" => "success").increment(1);
                logger.log_completion(&format!(
                    "{} ({:.1}s of video in {:.1}s)",
                    outcome.output_path.display(),
                    outcome.duration_seconds,
                    elapsed
                ));
                progress.done(outcome.output_path.display().to_string());
            }
            Err(e) => {
                metrics::counter!("promo_renders_total", "result" => "failure").increment(1);
                let stage = e.stage().map(|s| s.as_str()).unwrap_or("request");
                logger.log_error(stage, &e.to_string());
                progress.failed(e.to_string());
            }
        }

        result
    }

    async fn render_session(
        &self,
        request: &RenderRequest,
        resolver: &AssetResolver,
        logger: &RenderLogger,
        progress: &ProgressReporter,
    ) -> WorkerResult<RenderOutcome> {
        let options = &request.options;
        logger.log_start(&format!(
            "{} images, {} audio files",
            request.images.len(),
            request.audio.len()
        ));

        // Resolve assets
        progress.report(RenderStep::ResolvingAssets, 2, "Checking input files");
        let voiceover = validate_request(request).at_stage(RenderStage::Planning)?;
        create_dir(resolver.work_dir()).await?;

        let output_path = request
            .output_path
            .clone()
            .unwrap_or_else(|| resolver.output_video_path());
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent).await?;
        }

        let background_music = if options.enable_background_music {
            match (&request.background_music, &self.config.music_dir) {
                (Some(explicit), _) => Some(explicit.clone()),
                (None, Some(dir)) => select_background_music(dir).await,
                (None, None) => {
                    logger.log_warning("No music directory configured, rendering without background music");
                    None
                }
            }
        } else {
            None
        };

        // Analyze narration
        progress.report(RenderStep::AnalyzingAudio, 8, "Analyzing voiceover");
        let analyzed = {
            let _slot = self.acquire_slot().await?;
            analyze_audio_file(&self.config.ffprobe_bin, &voiceover).await
        };
        let analysis = match analyzed {
            Ok(a) => {
                if !a.issues.is_empty() {
                    logger.log_warning(&format!("Voiceover quality issues: {}", a.issues.join(", ")));
                }
                Some(a)
            }
            Err(e) if request.per_image_seconds.is_some() => {
                logger.log_warning(&format!("Voiceover analysis failed: {}", e));
                None
            }
            Err(e) => return Err(WorkerError::at(RenderStage::Planning, e)),
        };
        let image_duration = match (request.per_image_seconds, &analysis) {
            (Some(per_image_seconds), _) => ImageDuration::Explicit { per_image_seconds },
            (None, Some(a)) => ImageDuration::FromVoiceover {
                voiceover_seconds: a.info.duration,
            },
            (None, None) => {
                return Err(WorkerError::at(
                    RenderStage::Planning,
                    MediaError::configuration("Voiceover duration unavailable"),
                ))
            }
        };
        let voice_quality = analysis.as_ref().map(|a| a.quality);

        // Volumes
        progress.report(RenderStep::Mixing, 14, "Normalizing volumes");
        if let Some(bed) = &background_music {
            self.check_background(bed).await?;
        }
        let requested = RequestedVolumes {
            voice: options.voice_volume,
            background: options.background_volume,
            intro: options.intro_outro_options.intro_volume,
            outro: options.intro_outro_options.outro_volume,
        };
        let mut reported = requested_for_report(&self.mixer, &requested);
        if background_music.is_none() {
            reported.background = 0.0;
        }
        let clipping = self.mixer.check_windows(&reported, &active_windows(options));
        if clipping.will_clip {
            logger.log_warning(&format!(
                "Requested volumes peak at {:.2}, mixing with clamped levels",
                clipping.peak
            ));
        }
        let volumes = self.mixer.normalize_all(&requested);
        let fade = self.mixer.clamp_fade(options.fade_duration);

        // Timeline
        progress.report(RenderStep::Planning, 20, "Planning timeline");
        let timeline = plan_timeline(&TimelineRequest {
            image_count: request.images.len(),
            image_duration,
            cards: options.enable_intro_outro.then(|| CardTiming {
                intro_seconds: options.intro_outro_options.intro_duration,
                outro_seconds: options.intro_outro_options.outro_duration,
                intro_volume: volumes.intro,
                outro_volume: volumes.outro,
            }),
            transition_seconds: options.transition_seconds(),
            main_volume: volumes.background,
        })
        .at_stage(RenderStage::Planning)?;
        logger.log_progress(
            RenderStage::Planning.as_str(),
            &format!("{} segments, {:.2}s total", timeline.segments.len(), timeline.total_duration),
        );

        // Overlay code
        let code_image = if options.wants_corner_overlay() || options.wants_outro_code() {
            self.render_code_image(options, resolver, logger).await
        } else {
            None
        };

        // Graph
        progress.report(RenderStep::BuildingGraph, 30, "Building filter graph");
        let sources = GraphSources {
            images: request.images.clone(),
            intro_image: options.intro_outro_options.intro_image_path.clone(),
            outro_image: options.intro_outro_options.outro_image_path.clone(),
            code_image,
            voice: Some(AudioTrack::new(AudioRole::Voice, &voiceover, volumes.voice)),
            background: background_music
                .as_ref()
                .map(|path| AudioTrack::new(AudioRole::Background, path, volumes.background).with_fades(fade, fade)),
        };
        let built = GraphBuilder::from_options(options, self.mixer.clone())
            .build(&timeline, &sources)
            .at_stage(RenderStage::GraphBuilding)?;
        logger.log_progress(
            RenderStage::GraphBuilding.as_str(),
            &format!("{} inputs, {} filter nodes", built.inputs.len(), built.graph.nodes().len()),
        );

        // Execute
        let job = RenderJob::new(built, &output_path, options);
        let output_path = self.execute(&job, progress).await?;
        self.check_output_duration(&output_path, timeline.total_duration, logger).await?;

        let thumbnail_path = if self.config.generate_thumbnails {
            progress.report(RenderStep::Thumbnail, 97, "Extracting thumbnail");
            let thumb = resolver.thumbnail_path();
            let generated = {
                let _slot = self.acquire_slot().await?;
                generate_thumbnail(&self.executor, &output_path, &thumb).await
            };
            match generated {
                Ok(()) => Some(thumb),
                Err(e) => {
                    logger.log_warning(&format!("Thumbnail generation failed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        Ok(RenderOutcome {
            session_id: resolver.session().clone(),
            output_path,
            thumbnail_path,
            duration_seconds: timeline.total_duration,
            clipping,
            voice_quality,
            background_music,
        })
    }

    async fn execute(&self, job: &RenderJob, progress: &ProgressReporter) -> WorkerResult<PathBuf> {
        let _slot = self.acquire_slot().await?;

        progress.report(RenderStep::Rendering, RENDER_PROGRESS_BAND.0, "Rendering video");
        let reporter = progress.clone();
        let total_ms = job.total_duration_ms();
        let (from, to) = RENDER_PROGRESS_BAND;

        self.executor
            .execute_with_progress(job, move |p| reporter.rendering(p.percentage(total_ms), from, to))
            .await
            .at_stage(RenderStage::Execution)
    }

    /// Every ffmpeg/ffprobe child runs while holding one of these.
    async fn acquire_slot(&self) -> WorkerResult<SemaphorePermit<'_>> {
        self.render_slots
            .acquire()
            .await
            .map_err(|_| WorkerError::config_error("render limiter closed"))
    }

    /// The bed is looped to the output length, so it must have some length.
    async fn check_background(&self, bed: &Path) -> WorkerResult<()> {
        let _slot = self.acquire_slot().await?;
        let duration = get_duration(&self.config.ffprobe_bin, bed)
            .await
            .at_stage(RenderStage::Mixing)?;
        if !(duration > 0.0) {
            return Err(WorkerError::at(
                RenderStage::Mixing,
                MediaError::configuration(format!("Background track {} has no duration", bed.display())),
            ));
        }
        Ok(())
    }

    /// Compare the encoded length with the plan. Drift is logged, not fatal.
    async fn check_output_duration(&self, output: &Path, planned: f64, logger: &RenderLogger) -> WorkerResult<()> {
        let probed = {
            let _slot = self.acquire_slot().await?;
            probe_video_with(&self.config.ffprobe_bin, output).await
        };
        if let Err(e) = probed.and_then(|info| check_rendered_duration(output, &info, planned)) {
            logger.log_warning(&format!("Output duration check: {}", e));
        }
        Ok(())
    }

    async fn render_code_image(
        &self,
        options: &RenderOptions,
        resolver: &AssetResolver,
        logger: &RenderLogger,
    ) -> Option<PathBuf> {
        let payload = options.payload()?;
        let rendered = match self.acquire_slot().await {
            Ok(_slot) => self.code_renderer.render(payload, &resolver.code_image_path()).await,
            Err(e) => {
                logger.log_warning(&format!("Code image skipped: {}", e));
                return None;
            }
        };
        match rendered {
            Ok(path) => Some(path),
            Err(e) => {
                logger.log_warning(&format!("Code image unavailable, rendering without it: {}", e));
                None
            }
        }
    }
}

/// Check the request before anything runs and return the narration path.
fn validate_request(request: &RenderRequest) -> Result<PathBuf, MediaError> {
    if request.images.is_empty() {
        return Err(MediaError::configuration("At least one product image is required"));
    }
    if request.options.fps == 0 {
        return Err(MediaError::configuration("fps must be at least 1"));
    }
    let voiceover = request
        .voiceover()
        .ok_or_else(|| MediaError::configuration("A voiceover audio file is required"))?
        .to_path_buf();

    if let Some(missing) = request.assets().into_iter().find(|a| !a.path().exists()) {
        return Err(MediaError::FileNotFound(missing.path));
    }
    Ok(voiceover)
}

/// Mix windows that play for these options.
fn active_windows(options: &RenderOptions) -> Vec<SegmentKind> {
    if options.enable_intro_outro {
        ALL_WINDOWS.to_vec()
    } else {
        vec![SegmentKind::Main]
    }
}

async fn create_dir(path: &Path) -> WorkerResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(MediaError::from)
        .at_stage(RenderStage::Planning)
}

/// Requested volumes with defaults filled in but no clamping, so the
/// clipping report reflects what the caller asked for.
fn requested_for_report(mixer: &AudioMixer, requested: &RequestedVolumes) -> MixVolumes {
    let pick = |role: AudioRole, value: Option<f64>| match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => mixer.normalize_volume(role, None),
    };
    MixVolumes {
        voice: pick(AudioRole::Voice, requested.voice),
        background: pick(AudioRole::Background, requested.background),
        intro: pick(AudioRole::Intro, requested.intro),
        outro: pick(AudioRole::Outro, requested.outro),
    }
}
