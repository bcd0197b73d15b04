//! Assembles the full video + audio graph for one render.

use std::path::PathBuf;

use tracing::debug;

use promo_models::{AudioTrack, OverlayPlacement, RenderOptions, Resolution, Segment};

use super::inputs::{InputList, InputRole};
use super::node::{FilterNode, Pin};
use super::FilterGraph;
use crate::command::FfmpegInput;
use crate::error::{MediaError, MediaResult};
use crate::filters::{chain, concat_video, fit_to_frame, overlay_center, overlay_corner, scale_square, split, xfade};
use crate::mixer::{AudioMixer, MixPlan, MixVolumes, MixWindows};
use crate::timeline::Timeline;

/// Distance between the corner badge and the frame edges.
pub const CORNER_MARGIN_PX: u32 = 20;

/// Final video pad.
pub const VIDEO_OUT: &str = "vout";

/// Files feeding one render.
#[derive(Debug, Clone, Default)]
pub struct GraphSources {
    /// Ordered product images
    pub images: Vec<PathBuf>,
    /// Explicit intro card image; defaults to the first product image
    pub intro_image: Option<PathBuf>,
    /// Explicit outro card image; defaults to the last product image
    pub outro_image: Option<PathBuf>,
    /// Rendered scannable code
    pub code_image: Option<PathBuf>,
    pub voice: Option<AudioTrack>,
    pub background: Option<AudioTrack>,
}

/// A validated graph together with the inputs it was built against.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: FilterGraph,
    pub inputs: InputList,
    pub total_duration: f64,
}

impl BuiltGraph {
    /// The `-map` targets, video first.
    pub fn output_pins(&self) -> Vec<String> {
        self.graph.outputs().iter().map(|l| format!("[{}]", l)).collect()
    }
}

/// Builds the filter graph from a timeline and its sources.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    resolution: Resolution,
    fps: u32,
    background_color: String,
    corner_overlay: bool,
    outro_code: bool,
    mixer: AudioMixer,
}

impl GraphBuilder {
    pub fn new(resolution: Resolution, fps: u32) -> Self {
        Self {
            resolution: resolution.even(),
            fps: fps.max(1),
            background_color: promo_models::options::DEFAULT_BACKGROUND_COLOR.to_string(),
            corner_overlay: false,
            outro_code: false,
            mixer: AudioMixer::default(),
        }
    }

    /// Builder configured from render options.
    pub fn from_options(options: &RenderOptions, mixer: AudioMixer) -> Self {
        Self::new(options.resolution, options.fps)
            .with_background_color(&options.background_color)
            .with_corner_overlay(options.wants_corner_overlay())
            .with_outro_code(options.wants_outro_code())
            .with_mixer(mixer)
    }

    pub fn with_background_color(mut self, color: &str) -> Self {
        if !color.trim().is_empty() {
            self.background_color = color.trim().to_string();
        }
        self
    }

    pub fn with_corner_overlay(mut self, enabled: bool) -> Self {
        self.corner_overlay = enabled;
        self
    }

    pub fn with_outro_code(mut self, enabled: bool) -> Self {
        self.outro_code = enabled;
        self
    }

    pub fn with_mixer(mut self, mixer: AudioMixer) -> Self {
        self.mixer = mixer;
        self
    }

    /// Build and validate the graph.
    pub fn build(&self, timeline: &Timeline, sources: &GraphSources) -> MediaResult<BuiltGraph> {
        if sources.images.is_empty() {
            return Err(MediaError::configuration("No product images supplied"));
        }
        let voice = sources
            .voice
            .as_ref()
            .ok_or_else(|| MediaError::configuration("No voiceover audio supplied"))?;

        let main: Vec<&Segment> = timeline.main_segments().collect();
        if main.len() != sources.images.len() {
            return Err(MediaError::configuration(format!(
                "Timeline has {} main segments for {} images",
                main.len(),
                sources.images.len()
            )));
        }

        let wants_placement = |placement: OverlayPlacement| {
            sources.code_image.is_some()
                && timeline
                    .segments
                    .iter()
                    .any(|s| s.kind.overlay_placement() == placement)
        };
        let corner = self.corner_overlay && wants_placement(OverlayPlacement::Corner);
        let full = self.outro_code && wants_placement(OverlayPlacement::FullFrame);

        let mut inputs = InputList::new();
        let mut graph = FilterGraph::new();
        let fit = || fit_to_frame(self.resolution, &self.background_color, self.fps);

        // Positional inputs are registered in timeline order, then overlay, then audio.
        let mut sequence: Vec<Pin> = Vec::new();

        if let Some(intro) = timeline.intro() {
            let path = sources.intro_image.as_ref().unwrap_or(&sources.images[0]);
            let idx = inputs.push(
                InputRole::IntroImage,
                FfmpegInput::looped_image(path, intro.clip_seconds(), self.fps),
            )?;
            graph.extend(chain(Pin::video(idx), fit(), "intro", "vintro"));
            sequence.push(Pin::label("vintro"));
        }

        let mut main_pin: Option<Pin> = None;
        let mut offsets = timeline.crossfade_offsets().into_iter();
        let mut previous: Option<&Segment> = None;
        for (k, seg) in main.iter().copied().enumerate() {
            let image = seg
                .image_refs
                .first()
                .and_then(|r| sources.images.get(*r))
                .unwrap_or(&sources.images[k]);
            let idx = inputs.push(
                InputRole::MainImage(k),
                FfmpegInput::looped_image(image, seg.clip_seconds(), self.fps),
            )?;
            let label = format!("vm{}", k);
            graph.extend(chain(Pin::video(idx), fit(), &format!("m{}", k), &label));

            main_pin = Some(match (main_pin.take(), previous) {
                (None, _) | (_, None) => Pin::Label(label),
                (Some(acc), Some(prev)) => {
                    let out = format!("xm{}", k);
                    match &prev.transition_to_next {
                        Some(t) => {
                            let offset = offsets.next().ok_or_else(|| {
                                MediaError::graph_invariant(format!("no crossfade offset for image {}", k))
                            })?;
                            graph.push(xfade(acc, Pin::Label(label), &t.name, t.duration, offset, &out))
                        }
                        None => graph.push(concat_video(vec![acc, Pin::Label(label)], &out)),
                    }
                    Pin::Label(out)
                }
            });
            previous = Some(seg);
        }
        let mut main_pin = main_pin.ok_or_else(|| MediaError::graph_invariant("main block produced no stream"))?;

        let outro_segment = timeline.outro();
        let outro_idx = match outro_segment {
            Some(outro) => {
                let path = sources
                    .outro_image
                    .as_ref()
                    .or_else(|| sources.images.last())
                    .unwrap_or(&sources.images[0]);
                Some(inputs.push(
                    InputRole::OutroImage,
                    FfmpegInput::looped_image(path, outro.clip_seconds(), self.fps),
                )?)
            }
            None => None,
        };

        let mut code_small: Option<Pin> = None;
        let mut code_full: Option<Pin> = None;
        if let (true, Some(code)) = (corner || full, sources.code_image.as_ref()) {
            let idx = inputs.push(
                InputRole::CodeImage,
                FfmpegInput::looped_image(code, timeline.total_duration, self.fps),
            )?;
            let short_side = self.resolution.width.min(self.resolution.height);
            let small_size = even(short_side / 6);
            let full_size = even(short_side * 3 / 5);

            let (small_src, full_src) = if corner && full {
                graph.push(split(Pin::video(idx), &["code_a", "code_b"]));
                (Some(Pin::label("code_a")), Some(Pin::label("code_b")))
            } else if corner {
                (Some(Pin::video(idx)), None)
            } else {
                (None, Some(Pin::video(idx)))
            };

            if let Some(src) = small_src {
                graph.push(scale_square(small_size).input(src).output("code_small"));
                code_small = Some(Pin::label("code_small"));
            }
            if let Some(src) = full_src {
                graph.push(scale_square(full_size).input(src).output("code_full"));
                code_full = Some(Pin::label("code_full"));
            }
        }

        if let Some(badge) = code_small {
            graph.push(overlay_corner(main_pin, badge, CORNER_MARGIN_PX, "vmain_code"));
            main_pin = Pin::label("vmain_code");
        }
        sequence.push(main_pin);

        if let Some(idx) = outro_idx {
            match code_full {
                Some(code) => {
                    graph.extend(chain(Pin::video(idx), fit(), "outro", "voutro_base"));
                    graph.push(overlay_center(Pin::label("voutro_base"), code, "voutro"));
                }
                None => graph.extend(chain(Pin::video(idx), fit(), "outro", "voutro")),
            }
            sequence.push(Pin::label("voutro"));
        }

        let video = if sequence.len() > 1 {
            graph.push(concat_video(sequence, "vcat"));
            Pin::label("vcat")
        } else {
            sequence.remove(0)
        };
        graph.push(
            FilterNode::new("format")
                .input(video)
                .positional("yuv420p")
                .output(VIDEO_OUT),
        );

        let voice_idx = inputs.push(InputRole::Voice, FfmpegInput::file(&voice.path))?;
        let background = sources.background.as_ref();
        let background_idx = match background {
            Some(bg) => Some(inputs.push(InputRole::Background, FfmpegInput::file(&bg.path))?),
            None => None,
        };

        let volumes = MixVolumes {
            voice: voice.target_volume,
            background: background.map(|b| b.target_volume).unwrap_or(0.0),
            intro: timeline.intro().map(|s| s.volume_level).unwrap_or(0.0),
            outro: outro_segment.map(|s| s.volume_level).unwrap_or(0.0),
        };
        let mix = self.mixer.build_mix(&MixPlan {
            voice_input: voice_idx,
            background_input: background_idx,
            volumes,
            fade_in: background.map(|b| b.fade_in).unwrap_or(0.0),
            fade_out: background.map(|b| b.fade_out).unwrap_or(0.0),
            windows: MixWindows {
                intro_seconds: timeline.intro_duration(),
                outro_start: timeline.outro_start(),
                total_seconds: timeline.total_duration,
            },
            has_cards: timeline.intro().is_some() || outro_segment.is_some(),
        });
        graph.extend(mix.nodes);

        graph.add_output(VIDEO_OUT);
        graph.add_output(mix.output);

        graph.validate(inputs.len())?;
        let referenced = graph.referenced_inputs();
        if let Some(unused) = (0..inputs.len()).find(|i| !referenced.contains(i)) {
            return Err(MediaError::graph_invariant(format!(
                "input {} ({}) is never read by the graph",
                unused,
                inputs.entries()[unused].role
            )));
        }

        debug!(
            input_count = inputs.len(),
            nodes = graph.nodes().len(),
            corner_overlay = corner,
            outro_code = full,
            total_secs = timeline.total_duration,
            "Built filter graph"
        );

        Ok(BuiltGraph {
            graph,
            inputs,
            total_duration: timeline.total_duration,
        })
    }
}

fn even(value: u32) -> u32 {
    (value / 2 * 2).max(2)
}
