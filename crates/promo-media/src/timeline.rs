//! Segment timing for intro, product images and outro.
//!
//! Main-content timing follows the narration: with `N` images and a
//! voiceover of `D` seconds every image contributes `D / N` seconds to the
//! output. Crossfades overlap adjacent images instead of adding time, so
//! each image except the last is fed to FFmpeg for `D / N + T` seconds and
//! the main block still lasts exactly `D`.

use tracing::debug;

use promo_models::{Segment, SegmentKind, Transition};

use crate::error::{MediaError, MediaResult};

/// Substitute for missing or non-positive intro/outro durations.
pub const DEFAULT_CARD_SECS: f64 = 5.0;

/// Allowed drift between planned and rendered duration.
pub const DURATION_TOLERANCE_SECS: f64 = 0.05;

/// Crossfades shorter than this are treated as hard cuts.
const MIN_TRANSITION_SECS: f64 = 0.01;

/// Where per-image timing comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageDuration {
    /// Narration length spread evenly over the images
    FromVoiceover { voiceover_seconds: f64 },
    /// Fixed time per image
    Explicit { per_image_seconds: f64 },
}

/// Intro/outro card timing. Durations are raw caller input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CardTiming {
    pub intro_seconds: Option<f64>,
    pub outro_seconds: Option<f64>,
    pub intro_volume: f64,
    pub outro_volume: f64,
}

/// Input to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRequest {
    pub image_count: usize,
    pub image_duration: ImageDuration,
    /// `None` disables intro and outro cards
    pub cards: Option<CardTiming>,
    /// Requested crossfade between adjacent images
    pub transition_seconds: f64,
    /// Music level under the narration
    pub main_volume: f64,
}

/// Ordered segments plus their total length.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub segments: Vec<Segment>,
    pub total_duration: f64,
}

impl Timeline {
    pub fn intro(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.kind == SegmentKind::Intro)
    }

    pub fn outro(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.kind == SegmentKind::Outro)
    }

    pub fn main_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.kind == SegmentKind::Main)
    }

    pub fn intro_duration(&self) -> f64 {
        self.intro().map(|s| s.duration_seconds).unwrap_or(0.0)
    }

    pub fn outro_duration(&self) -> f64 {
        self.outro().map(|s| s.duration_seconds).unwrap_or(0.0)
    }

    /// Length of the product-image block.
    pub fn main_duration(&self) -> f64 {
        self.main_segments().map(|s| s.duration_seconds).sum()
    }

    /// Output time at which the outro starts (or the video ends).
    pub fn outro_start(&self) -> f64 {
        self.intro_duration() + self.main_duration()
    }

    /// xfade offsets for each main-image transition, relative to the start
    /// of the main block.
    pub fn crossfade_offsets(&self) -> Vec<f64> {
        let mut elapsed = 0.0;
        let mut offsets = Vec::new();
        for seg in self.main_segments() {
            elapsed += seg.duration_seconds;
            if seg.transition_to_next.is_some() {
                offsets.push(elapsed);
            }
        }
        offsets
    }

    /// Sum of segment durations, which must equal `total_duration`.
    pub fn segment_sum(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }
}

/// Replace missing, non-finite or non-positive card durations by the default.
pub fn resolve_card_duration(requested: Option<f64>) -> f64 {
    match requested {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => DEFAULT_CARD_SECS,
    }
}

/// Start of a fade-out ending with the segment, clamped to `[0, duration]`.
pub fn fade_out_start(segment_duration: f64, fade_out_duration: f64) -> f64 {
    let duration = segment_duration.max(0.0);
    (duration - fade_out_duration.max(0.0)).clamp(0.0, duration)
}

/// Plan the segment list for one render.
pub fn plan_timeline(request: &TimelineRequest) -> MediaResult<Timeline> {
    if request.image_count == 0 {
        return Err(MediaError::configuration(
            "At least one image is required to plan a timeline",
        ));
    }

    let n = request.image_count;
    let per_image = match request.image_duration {
        ImageDuration::FromVoiceover { voiceover_seconds } => voiceover_seconds / n as f64,
        ImageDuration::Explicit { per_image_seconds } => per_image_seconds,
    };

    if !per_image.is_finite() || per_image <= 0.0 {
        return Err(MediaError::configuration(format!(
            "Main content duration must be positive, got {:?}",
            request.image_duration
        )));
    }

    // Cap the overlap so every xfade offset stays positive.
    let transition = if n >= 2 {
        let t = request.transition_seconds.max(0.0).min(per_image / 2.0);
        (t >= MIN_TRANSITION_SECS).then_some(t)
    } else {
        None
    };

    let mut segments = Vec::with_capacity(n + 2);

    if let Some(cards) = &request.cards {
        let intro = resolve_card_duration(cards.intro_seconds);
        segments.push(Segment::new(SegmentKind::Intro, intro, cards.intro_volume));
    }

    for index in 0..n {
        let mut seg = Segment::new(SegmentKind::Main, per_image, request.main_volume)
            .with_images(vec![index]);
        if index + 1 < n {
            if let Some(t) = transition {
                seg = seg.with_transition(Transition::crossfade(t));
            }
        }
        segments.push(seg);
    }

    if let Some(cards) = &request.cards {
        let outro = resolve_card_duration(cards.outro_seconds);
        segments.push(Segment::new(SegmentKind::Outro, outro, cards.outro_volume));
    }

    let total_duration: f64 = segments.iter().map(|s| s.duration_seconds).sum();
    if !(total_duration > 0.0) {
        return Err(MediaError::configuration(format!(
            "Total duration must be positive, got {}",
            total_duration
        )));
    }

    debug!(
        images = n,
        per_image_secs = per_image,
        transition_secs = transition.unwrap_or(0.0),
        total_secs = total_duration,
        "Planned timeline"
    );

    Ok(Timeline {
        segments,
        total_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiceover_request(images: usize, voiceover: f64, cards: Option<CardTiming>) -> TimelineRequest {
        TimelineRequest {
            image_count: images,
            image_duration: ImageDuration::FromVoiceover {
                voiceover_seconds: voiceover,
            },
            cards,
            transition_seconds: 1.0,
            main_volume: 0.15,
        }
    }

    fn cards(intro: f64, outro: f64) -> CardTiming {
        CardTiming {
            intro_seconds: Some(intro),
            outro_seconds: Some(outro),
            intro_volume: 0.3,
            outro_volume: 0.3,
        }
    }

    #[test]
    fn test_single_image_no_cards() {
        let timeline = plan_timeline(&voiceover_request(1, 12.0, None)).unwrap();
        assert_eq!(timeline.segments.len(), 1);
        assert_eq!(timeline.segments[0].kind, SegmentKind::Main);
        assert!((timeline.segments[0].duration_seconds - 12.0).abs() < 1e-9);
        assert!((timeline.total_duration - 12.0).abs() < 1e-9);
        assert!(timeline.segments[0].transition_to_next.is_none());
        assert!(timeline.crossfade_offsets().is_empty());
    }

    #[test]
    fn test_three_images_with_cards() {
        let timeline = plan_timeline(&voiceover_request(3, 30.0, Some(cards(5.0, 5.0)))).unwrap();

        let kinds: Vec<_> = timeline.segments.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Intro,
                SegmentKind::Main,
                SegmentKind::Main,
                SegmentKind::Main,
                SegmentKind::Outro
            ]
        );

        let transitions = timeline
            .main_segments()
            .filter(|s| s.transition_to_next.is_some())
            .count();
        assert_eq!(transitions, 2);

        assert!((timeline.main_duration() - 30.0).abs() < DURATION_TOLERANCE_SECS);
        assert!((timeline.total_duration - 40.0).abs() < DURATION_TOLERANCE_SECS);
        assert_eq!(timeline.crossfade_offsets(), vec![10.0, 20.0]);
        assert!((timeline.outro_start() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_intro_uses_default() {
        let timeline = plan_timeline(&voiceover_request(2, 10.0, Some(cards(-1.0, 0.0)))).unwrap();
        assert!((timeline.intro_duration() - DEFAULT_CARD_SECS).abs() < 1e-9);
        assert!((timeline.outro_duration() - DEFAULT_CARD_SECS).abs() < 1e-9);
        assert!((timeline.total_duration - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_card_duration_uses_default() {
        assert_eq!(resolve_card_duration(None), DEFAULT_CARD_SECS);
        assert_eq!(resolve_card_duration(Some(f64::NAN)), DEFAULT_CARD_SECS);
        assert_eq!(resolve_card_duration(Some(2.5)), 2.5);
    }

    #[test]
    fn test_zero_images_is_configuration_error() {
        let err = plan_timeline(&voiceover_request(0, 10.0, None)).unwrap_err();
        assert!(matches!(err, MediaError::Configuration(_)));
    }

    #[test]
    fn test_non_positive_duration_is_configuration_error() {
        for d in [0.0, -3.0, f64::NAN] {
            let err = plan_timeline(&voiceover_request(2, d, None)).unwrap_err();
            assert!(matches!(err, MediaError::Configuration(_)));
        }
    }

    #[test]
    fn test_explicit_per_image_duration() {
        let request = TimelineRequest {
            image_count: 4,
            image_duration: ImageDuration::Explicit {
                per_image_seconds: 2.5,
            },
            cards: None,
            transition_seconds: 0.5,
            main_volume: 0.1,
        };
        let timeline = plan_timeline(&request).unwrap();
        assert!((timeline.total_duration - 10.0).abs() < 1e-9);
        assert_eq!(timeline.crossfade_offsets().len(), 3);
    }

    #[test]
    fn test_transition_capped_to_half_an_image() {
        let mut request = voiceover_request(4, 4.0, None);
        request.transition_seconds = 3.0;
        let timeline = plan_timeline(&request).unwrap();
        let first = timeline.main_segments().next().unwrap();
        let t = first.transition_to_next.as_ref().unwrap().duration;
        assert!((t - 0.5).abs() < 1e-9);
        assert!((timeline.main_duration() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_transition_means_hard_cuts() {
        let mut request = voiceover_request(3, 9.0, None);
        request.transition_seconds = 0.0;
        let timeline = plan_timeline(&request).unwrap();
        assert!(timeline.main_segments().all(|s| s.transition_to_next.is_none()));
    }

    #[test]
    fn test_total_matches_voiceover_plus_cards() {
        for images in 1..=12 {
            for voiceover in [0.5, 7.3, 12.0, 30.0, 95.25] {
                let timeline =
                    plan_timeline(&voiceover_request(images, voiceover, Some(cards(4.0, 6.0)))).unwrap();
                let expected = voiceover + 10.0;
                assert!((timeline.total_duration - expected).abs() < DURATION_TOLERANCE_SECS);
                assert!((timeline.segment_sum() - timeline.total_duration).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_fade_out_start_within_segment() {
        assert_eq!(fade_out_start(10.0, 2.0), 8.0);
        assert_eq!(fade_out_start(1.0, 3.0), 0.0);
        assert_eq!(fade_out_start(0.0, 0.0), 0.0);
        for d in [0.0, 0.3, 1.0, 5.0, 60.0] {
            for f in [0.0, 0.5, 1.0, 3.0, 100.0] {
                let start = fade_out_start(d, f);
                assert!((0.0..=d).contains(&start));
            }
        }
    }
}
