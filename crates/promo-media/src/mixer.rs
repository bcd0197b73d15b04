//! Audio mixing: volume normalization, clipping analysis and the audio
//! filter chain.
//!
//! The mix has three concurrent windows. During the intro only the intro
//! music level plays, during the main block the narration plays over the
//! background bed, and during the outro only the outro music level plays.
//! A window clips when its summed gain exceeds [`SAFE_MIXING_THRESHOLD`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use promo_models::{AudioRole, SegmentKind};

use crate::filters::chain;
use crate::graph::{quoted, secs, FilterNode, Pin};
use crate::error::MediaResult;
use crate::probe::{probe_audio_with, AudioInfo};
use crate::timeline::fade_out_start;

/// Summed gain above which a window is considered to clip. Equal is safe.
pub const SAFE_MIXING_THRESHOLD: f64 = 1.2;

pub const MIN_VOLUME: f64 = 0.05;

pub const DEFAULT_VOICE_VOLUME: f64 = 1.0;
pub const DEFAULT_INTRO_VOLUME: f64 = 0.3;
pub const DEFAULT_OUTRO_VOLUME: f64 = 0.3;
pub const DEFAULT_BACKGROUND_VOLUME: f64 = 0.15;

pub const MIN_FADE_SECS: f64 = 1.0;
pub const MAX_FADE_SECS: f64 = 3.0;
pub const DEFAULT_FADE_SECS: f64 = 2.0;

/// Per-role volume ceilings and the shared floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeLimits {
    pub voice_max: f64,
    pub intro_max: f64,
    pub outro_max: f64,
    pub background_max: f64,
    pub min: f64,
    pub safe_threshold: f64,
}

impl Default for VolumeLimits {
    fn default() -> Self {
        Self {
            voice_max: 1.0,
            intro_max: 0.4,
            outro_max: 0.4,
            background_max: 0.2,
            min: MIN_VOLUME,
            safe_threshold: SAFE_MIXING_THRESHOLD,
        }
    }
}

impl VolumeLimits {
    pub fn ceiling(&self, role: AudioRole) -> f64 {
        match role {
            AudioRole::Voice => self.voice_max,
            AudioRole::Intro => self.intro_max,
            AudioRole::Outro => self.outro_max,
            AudioRole::Background => self.background_max,
        }
    }
}

/// Volume used when a role has no usable request.
pub fn default_volume(role: AudioRole) -> f64 {
    match role {
        AudioRole::Voice => DEFAULT_VOICE_VOLUME,
        AudioRole::Intro => DEFAULT_INTRO_VOLUME,
        AudioRole::Outro => DEFAULT_OUTRO_VOLUME,
        AudioRole::Background => DEFAULT_BACKGROUND_VOLUME,
    }
}

/// One volume per role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixVolumes {
    pub voice: f64,
    pub background: f64,
    pub intro: f64,
    pub outro: f64,
}

impl Default for MixVolumes {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE_VOLUME,
            background: DEFAULT_BACKGROUND_VOLUME,
            intro: DEFAULT_INTRO_VOLUME,
            outro: DEFAULT_OUTRO_VOLUME,
        }
    }
}

impl MixVolumes {
    pub fn get(&self, role: AudioRole) -> f64 {
        match role {
            AudioRole::Voice => self.voice,
            AudioRole::Background => self.background,
            AudioRole::Intro => self.intro,
            AudioRole::Outro => self.outro,
        }
    }

    fn set(&mut self, role: AudioRole, value: f64) {
        match role {
            AudioRole::Voice => self.voice = value,
            AudioRole::Background => self.background = value,
            AudioRole::Intro => self.intro = value,
            AudioRole::Outro => self.outro = value,
        }
    }

    /// Summed gain of the tracks playing during `window`.
    pub fn window_sum(&self, window: SegmentKind) -> f64 {
        match window {
            SegmentKind::Intro => self.intro,
            SegmentKind::Main => self.voice + self.background,
            SegmentKind::Outro => self.outro,
        }
    }
}

/// Raw per-role requests; `None` means "use the default".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestedVolumes {
    pub voice: Option<f64>,
    pub background: Option<f64>,
    pub intro: Option<f64>,
    pub outro: Option<f64>,
}

/// Result of [`AudioMixer::check_audio_clipping`]. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingReport {
    pub will_clip: bool,
    /// Highest window sum
    pub peak: f64,
    /// Window holding the peak
    pub peak_window: SegmentKind,
    /// Safe combination when `will_clip` is set
    pub recommended: Option<MixVolumes>,
}

/// Where the audio chain sits on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixWindows {
    pub intro_seconds: f64,
    /// Output time at which the outro window opens
    pub outro_start: f64,
    pub total_seconds: f64,
}

/// Inputs to [`AudioMixer::build_mix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixPlan {
    pub voice_input: usize,
    pub background_input: Option<usize>,
    pub volumes: MixVolumes,
    /// Background fade-in length
    pub fade_in: f64,
    /// Background fade-out length
    pub fade_out: f64,
    pub windows: MixWindows,
    /// Whether intro/outro cards are present
    pub has_cards: bool,
}

/// Audio filter nodes and the pad carrying the final mix.
#[derive(Debug, Clone, PartialEq)]
pub struct MixChain {
    pub nodes: Vec<FilterNode>,
    pub output: String,
}

/// Every window a mix can have.
pub const ALL_WINDOWS: [SegmentKind; 3] = [SegmentKind::Intro, SegmentKind::Main, SegmentKind::Outro];

/// Output label of the mixed audio.
pub const AUDIO_OUT: &str = "aout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    Good,
    Acceptable,
    Poor,
}

/// Probe result plus detected quality issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub info: AudioInfo,
    pub quality: AudioQuality,
    pub issues: Vec<String>,
}

/// Normalizes volumes and emits the audio half of the filter graph.
#[derive(Debug, Clone, Default)]
pub struct AudioMixer {
    limits: VolumeLimits,
}

impl AudioMixer {
    pub fn new(limits: VolumeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &VolumeLimits {
        &self.limits
    }

    /// Clamp a requested volume into `[min, ceiling(role)]`.
    ///
    /// Missing or non-finite requests fall back to the role default.
    pub fn normalize_volume(&self, role: AudioRole, requested: Option<f64>) -> f64 {
        let value = match requested {
            Some(v) if v.is_finite() => v,
            _ => default_volume(role),
        };
        value.clamp(self.limits.min, self.limits.ceiling(role).max(self.limits.min))
    }

    pub fn normalize_all(&self, requested: &RequestedVolumes) -> MixVolumes {
        MixVolumes {
            voice: self.normalize_volume(AudioRole::Voice, requested.voice),
            background: self.normalize_volume(AudioRole::Background, requested.background),
            intro: self.normalize_volume(AudioRole::Intro, requested.intro),
            outro: self.normalize_volume(AudioRole::Outro, requested.outro),
        }
    }

    /// Sum each concurrent window and flag sums above the safe threshold.
    pub fn check_audio_clipping(&self, volumes: &MixVolumes) -> ClippingReport {
        self.check_windows(volumes, &ALL_WINDOWS)
    }

    /// Like [`Self::check_audio_clipping`], scoring only the windows that
    /// actually play. The main window is always scored.
    pub fn check_windows(&self, volumes: &MixVolumes, windows: &[SegmentKind]) -> ClippingReport {
        let (peak_window, peak) = windows
            .iter()
            .copied()
            .chain(std::iter::once(SegmentKind::Main))
            .map(|w| (w, volumes.window_sum(w)))
            .fold((SegmentKind::Main, f64::MIN), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });

        let will_clip = peak > self.limits.safe_threshold;
        let recommended = will_clip.then(|| self.recommend(volumes));

        if will_clip {
            warn!(
                peak,
                window = peak_window.as_str(),
                threshold = self.limits.safe_threshold,
                "Requested volumes exceed the safe mixing threshold"
            );
        }

        ClippingReport {
            will_clip,
            peak,
            peak_window,
            recommended,
        }
    }

    fn recommend(&self, volumes: &MixVolumes) -> MixVolumes {
        let mut safe = *volumes;
        for role in [
            AudioRole::Voice,
            AudioRole::Background,
            AudioRole::Intro,
            AudioRole::Outro,
        ] {
            safe.set(role, self.normalize_volume(role, Some(volumes.get(role))));
        }

        // Custom ceilings can still overflow the main window; lower the bed first.
        let overflow = safe.window_sum(SegmentKind::Main) - self.limits.safe_threshold;
        if overflow > 0.0 {
            safe.background = (safe.background - overflow).max(self.limits.min);
            let rest = safe.window_sum(SegmentKind::Main) - self.limits.safe_threshold;
            if rest > 0.0 {
                safe.voice = (safe.voice - rest).max(self.limits.min);
            }
        }
        safe
    }

    /// Clamp a fade length into `[1, 3]` seconds.
    pub fn clamp_fade(&self, requested: Option<f64>) -> f64 {
        match requested {
            Some(v) if v.is_finite() => v.clamp(MIN_FADE_SECS, MAX_FADE_SECS),
            _ => DEFAULT_FADE_SECS,
        }
    }

    /// Build the audio chain: voice scaled and delayed behind the intro,
    /// optional background bed looped, trimmed, faded and leveled per window,
    /// then both combined.
    pub fn build_mix(&self, plan: &MixPlan) -> MixChain {
        let windows = plan.windows;
        let mut nodes = Vec::new();

        let voice_label = if plan.background_input.is_some() {
            "voice"
        } else {
            AUDIO_OUT
        };

        let mut voice_steps = vec![FilterNode::new("volume").positional(secs(plan.volumes.voice))];
        if windows.intro_seconds > 0.0 {
            let delay_ms = (windows.intro_seconds * 1000.0).round() as u64;
            voice_steps.push(FilterNode::new("adelay").param("delays", delay_ms).param("all", 1));
        }
        if plan.background_input.is_none() {
            // Silence under the outro keeps the audio as long as the video.
            voice_steps.push(FilterNode::new("apad"));
        }
        nodes.extend(chain(Pin::audio(plan.voice_input), voice_steps, "voice", voice_label));

        if let Some(bg_index) = plan.background_input {
            let total = windows.total_seconds;
            let fade_in = plan.fade_in.clamp(0.0, total / 2.0);
            let fade_out = plan.fade_out.clamp(0.0, total / 2.0);

            let bg_steps = vec![
                FilterNode::new("aloop").param("loop", -1).param("size", "2e9"),
                FilterNode::new("atrim").param("duration", secs(total)),
                FilterNode::new("asetpts").positional("PTS-STARTPTS"),
                FilterNode::new("afade")
                    .param("t", "in")
                    .param("st", 0)
                    .param("d", secs(fade_in)),
                FilterNode::new("afade")
                    .param("t", "out")
                    .param("st", secs(fade_out_start(total, fade_out)))
                    .param("d", secs(fade_out)),
                FilterNode::new("volume")
                    .param("volume", self.level_expression(plan))
                    .param("eval", "frame"),
            ];
            nodes.extend(chain(Pin::audio(bg_index), bg_steps, "bg", "bed"));

            nodes.push(
                FilterNode::new("amix")
                    .input(Pin::label("voice"))
                    .input(Pin::label("bed"))
                    .param("inputs", 2)
                    .param("duration", "longest")
                    .param("dropout_transition", 0)
                    .param("normalize", 0)
                    .output(AUDIO_OUT),
            );
        }

        debug!(
            voice = plan.volumes.voice,
            background = plan.background_input.map(|_| plan.volumes.background),
            nodes = nodes.len(),
            "Built audio mix chain"
        );

        MixChain {
            nodes,
            output: AUDIO_OUT.to_string(),
        }
    }

    /// Time-varying gain for the background bed.
    fn level_expression(&self, plan: &MixPlan) -> String {
        let v = &plan.volumes;
        if !plan.has_cards {
            return secs(v.background);
        }
        quoted(&format!(
            "if(lt(t,{}),{},if(gte(t,{}),{},{}))",
            secs(plan.windows.intro_seconds),
            secs(v.intro),
            secs(plan.windows.outro_start),
            secs(v.outro),
            secs(v.background)
        ))
    }
}

/// Grade probed audio. Fewer issues is better.
pub fn assess_audio_quality(info: &AudioInfo) -> (AudioQuality, Vec<String>) {
    let mut issues = Vec::new();

    if info.sample_rate < 44_100 {
        issues.push(format!("low sample rate: {} Hz", info.sample_rate));
    }
    if info.bitrate < 128_000 {
        issues.push(format!("low bitrate: {} bps", info.bitrate));
    }
    if info.channels > 2 {
        issues.push(format!("unexpected channel count: {}", info.channels));
    }
    if info.duration < 10.0 {
        issues.push(format!("short duration: {:.1}s", info.duration));
    }

    let quality = match issues.len() {
        0 => AudioQuality::Good,
        1..=2 => AudioQuality::Acceptable,
        _ => AudioQuality::Poor,
    };

    (quality, issues)
}

/// Probe an audio file and grade it.
pub async fn analyze_audio_file(ffprobe: &str, path: impl AsRef<Path>) -> MediaResult<AudioAnalysis> {
    let info = probe_audio_with(ffprobe, path.as_ref()).await?;
    let (quality, issues) = assess_audio_quality(&info);
    debug!(path = %path.as_ref().display(), ?quality, issues = issues.len(), "Analyzed audio");
    Ok(AudioAnalysis {
        info,
        quality,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(intro: f64, main: f64, outro: f64) -> MixWindows {
        MixWindows {
            intro_seconds: intro,
            outro_start: intro + main,
            total_seconds: intro + main + outro,
        }
    }

    #[test]
    fn test_normalize_clamps_to_ceiling_and_floor() {
        let mixer = AudioMixer::default();
        assert_eq!(mixer.normalize_volume(AudioRole::Background, Some(0.9)), 0.2);
        assert_eq!(mixer.normalize_volume(AudioRole::Intro, Some(0.01)), MIN_VOLUME);
        assert_eq!(mixer.normalize_volume(AudioRole::Voice, Some(0.7)), 0.7);
        assert_eq!(mixer.normalize_volume(AudioRole::Outro, Some(1.0)), 0.4);
    }

    #[test]
    fn test_invalid_input_uses_default() {
        let mixer = AudioMixer::default();
        assert_eq!(mixer.normalize_volume(AudioRole::Voice, None), DEFAULT_VOICE_VOLUME);
        assert_eq!(mixer.normalize_volume(AudioRole::Intro, Some(f64::NAN)), DEFAULT_INTRO_VOLUME);
        assert_eq!(
            mixer.normalize_volume(AudioRole::Background, Some(f64::INFINITY)),
            DEFAULT_BACKGROUND_VOLUME
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mixer = AudioMixer::default();
        let roles = [AudioRole::Voice, AudioRole::Background, AudioRole::Intro, AudioRole::Outro];
        for role in roles {
            for v in [-1.0, 0.0, 0.03, 0.1, 0.25, 0.5, 1.0, 7.5] {
                let once = mixer.normalize_volume(role, Some(v));
                let twice = mixer.normalize_volume(role, Some(once));
                assert_eq!(once, twice);
                assert!(once >= MIN_VOLUME && once <= mixer.limits().ceiling(role));
            }
        }
    }

    #[test]
    fn test_clipping_boundary() {
        let mixer = AudioMixer::default();

        let at_threshold = MixVolumes {
            voice: 1.0,
            background: 0.2,
            ..Default::default()
        };
        let report = mixer.check_audio_clipping(&at_threshold);
        assert!(!report.will_clip);
        assert!(report.recommended.is_none());

        let above = MixVolumes {
            voice: 1.0,
            background: 0.25,
            ..Default::default()
        };
        let report = mixer.check_audio_clipping(&above);
        assert!(report.will_clip);
        assert_eq!(report.peak_window, SegmentKind::Main);
        let rec = report.recommended.unwrap();
        assert!(rec.window_sum(SegmentKind::Main) <= SAFE_MIXING_THRESHOLD);
        assert!(rec.background <= 0.2);
    }

    #[test]
    fn test_silent_card_windows_are_not_scored() {
        let mixer = AudioMixer::default();
        let loud_intro = MixVolumes {
            voice: 0.5,
            background: 0.1,
            intro: 1.5,
            outro: 0.3,
        };

        let report = mixer.check_windows(&loud_intro, &[SegmentKind::Main]);
        assert!(!report.will_clip);
        assert_eq!(report.peak_window, SegmentKind::Main);
        assert!((report.peak - 0.6).abs() < 1e-9);

        let report = mixer.check_windows(&loud_intro, &ALL_WINDOWS);
        assert!(report.will_clip);
        assert_eq!(report.peak_window, SegmentKind::Intro);
        assert_eq!(report, mixer.check_audio_clipping(&loud_intro));
    }

    #[test]
    fn test_normalized_defaults_never_clip() {
        let mixer = AudioMixer::default();
        let volumes = mixer.normalize_all(&RequestedVolumes {
            voice: Some(5.0),
            background: Some(5.0),
            intro: Some(5.0),
            outro: Some(5.0),
        });
        assert!(!mixer.check_audio_clipping(&volumes).will_clip);
    }

    #[test]
    fn test_custom_limits_recommendation_stays_safe() {
        let mixer = AudioMixer::new(VolumeLimits {
            voice_max: 1.0,
            background_max: 0.8,
            ..Default::default()
        });
        let report = mixer.check_audio_clipping(&MixVolumes {
            voice: 1.0,
            background: 0.8,
            ..Default::default()
        });
        assert!(report.will_clip);
        let rec = report.recommended.unwrap();
        assert!(rec.window_sum(SegmentKind::Main) <= SAFE_MIXING_THRESHOLD + 1e-9);
    }

    #[test]
    fn test_clamp_fade() {
        let mixer = AudioMixer::default();
        assert_eq!(mixer.clamp_fade(Some(0.2)), MIN_FADE_SECS);
        assert_eq!(mixer.clamp_fade(Some(10.0)), MAX_FADE_SECS);
        assert_eq!(mixer.clamp_fade(Some(2.5)), 2.5);
        assert_eq!(mixer.clamp_fade(None), DEFAULT_FADE_SECS);
    }

    #[test]
    fn test_mix_with_background() {
        let mixer = AudioMixer::default();
        let chain = mixer.build_mix(&MixPlan {
            voice_input: 3,
            background_input: Some(4),
            volumes: MixVolumes::default(),
            fade_in: 2.0,
            fade_out: 2.0,
            windows: windows(5.0, 30.0, 5.0),
            has_cards: true,
        });
        let text: Vec<String> = chain.nodes.iter().map(|n| n.to_string()).collect();
        let joined = text.join(";");

        assert_eq!(chain.output, AUDIO_OUT);
        assert!(joined.starts_with("[3:a]volume=1[voice_0];[voice_0]adelay=delays=5000:all=1[voice]"));
        assert!(joined.contains("[4:a]aloop=loop=-1:size=2e9"));
        assert!(joined.contains("atrim=duration=40"));
        assert!(joined.contains("afade=t=out:st=38:d=2"));
        assert!(joined.contains("volume=volume='if(lt(t,5),0.3,if(gte(t,35),0.3,0.15))':eval=frame[bed]"));
        assert!(joined.ends_with(
            "[voice][bed]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[aout]"
        ));
        assert!(!joined.contains("apad"));
    }

    #[test]
    fn test_mix_without_background_uses_voice_pin() {
        let mixer = AudioMixer::default();
        let chain = mixer.build_mix(&MixPlan {
            voice_input: 1,
            background_input: None,
            volumes: MixVolumes::default(),
            fade_in: 2.0,
            fade_out: 2.0,
            windows: windows(0.0, 12.0, 0.0),
            has_cards: false,
        });
        let joined: Vec<String> = chain.nodes.iter().map(|n| n.to_string()).collect();
        let joined = joined.join(";");
        assert_eq!(joined, "[1:a]volume=1[voice_0];[voice_0]apad[aout]");
        assert!(!joined.contains("amix"));
    }

    #[test]
    fn test_quality_grading() {
        let mut info = AudioInfo {
            duration: 30.0,
            bitrate: 192_000,
            sample_rate: 44_100,
            channels: 2,
            codec: "mp3".to_string(),
        };
        assert_eq!(assess_audio_quality(&info).0, AudioQuality::Good);

        info.sample_rate = 22_050;
        info.bitrate = 64_000;
        assert_eq!(assess_audio_quality(&info).0, AudioQuality::Acceptable);

        info.duration = 4.0;
        let (quality, issues) = assess_audio_quality(&info);
        assert_eq!(quality, AudioQuality::Poor);
        assert_eq!(issues.len(), 3);
    }
}
