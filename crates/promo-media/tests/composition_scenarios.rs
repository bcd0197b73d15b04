//! End-to-end planning scenarios: timeline, mix and graph without FFmpeg.

use std::path::PathBuf;

use promo_media::graph::{GraphBuilder, GraphSources, InputRole};
use promo_media::mixer::{AudioMixer, MixVolumes, VolumeLimits, SAFE_MIXING_THRESHOLD};
use promo_media::resolver::{parse_session_id, AssetResolver};
use promo_media::timeline::{
    fade_out_start, plan_timeline, CardTiming, ImageDuration, TimelineRequest, DEFAULT_CARD_SECS,
    DURATION_TOLERANCE_SECS,
};
use promo_models::{AudioRole, AudioTrack, Resolution, SegmentKind};

fn request(images: usize, voiceover: f64, cards: Option<(f64, f64)>) -> TimelineRequest {
    TimelineRequest {
        image_count: images,
        image_duration: ImageDuration::FromVoiceover {
            voiceover_seconds: voiceover,
        },
        cards: cards.map(|(intro, outro)| CardTiming {
            intro_seconds: Some(intro),
            outro_seconds: Some(outro),
            intro_volume: 0.3,
            outro_volume: 0.3,
        }),
        transition_seconds: 1.0,
        main_volume: 0.15,
    }
}

#[test]
fn scenario_single_image_without_cards() {
    let timeline = plan_timeline(&request(1, 12.0, None)).unwrap();
    assert_eq!(timeline.segments.len(), 1);
    assert_eq!(timeline.segments[0].kind, SegmentKind::Main);
    assert!((timeline.segments[0].duration_seconds - 12.0).abs() < DURATION_TOLERANCE_SECS);
    assert!((timeline.total_duration - 12.0).abs() < DURATION_TOLERANCE_SECS);
}

#[test]
fn scenario_three_images_with_cards() {
    let timeline = plan_timeline(&request(3, 30.0, Some((5.0, 5.0)))).unwrap();
    assert!((timeline.total_duration - 40.0).abs() < DURATION_TOLERANCE_SECS);
    assert!((timeline.main_duration() - 30.0).abs() < DURATION_TOLERANCE_SECS);
    assert_eq!(timeline.crossfade_offsets().len(), 2);
}

#[test]
fn scenario_sum_at_threshold_is_safe() {
    let mixer = AudioMixer::default();
    let report = mixer.check_audio_clipping(&MixVolumes {
        voice: 1.0,
        background: 0.2,
        ..Default::default()
    });
    assert!(!report.will_clip);
}

#[test]
fn scenario_loud_background_clips() {
    let mixer = AudioMixer::default();
    let report = mixer.check_audio_clipping(&MixVolumes {
        voice: 1.0,
        background: 0.8,
        ..Default::default()
    });
    assert!(report.will_clip);
    assert!((report.peak - 1.8).abs() < 1e-9);
    assert!(report.recommended.unwrap().background <= 0.2);
}

#[test]
fn scenario_negative_intro_duration() {
    let timeline = plan_timeline(&request(2, 10.0, Some((-1.0, 5.0)))).unwrap();
    assert_eq!(timeline.intro_duration(), DEFAULT_CARD_SECS);
}

#[test]
fn total_duration_tracks_voiceover_and_cards() {
    let card_options = [None, Some((5.0, 5.0)), Some((2.5, 7.0)), Some((-3.0, 0.0))];
    for images in 1..=10 {
        for voiceover in [1.0, 9.99, 30.0, 61.7] {
            for cards in card_options {
                let timeline = plan_timeline(&request(images, voiceover, cards)).unwrap();
                let card_total = cards
                    .map(|(i, o)| {
                        let fix = |d: f64| if d > 0.0 { d } else { DEFAULT_CARD_SECS };
                        fix(i) + fix(o)
                    })
                    .unwrap_or(0.0);
                assert!(
                    (timeline.total_duration - (voiceover + card_total)).abs() < DURATION_TOLERANCE_SECS,
                    "images={images} voiceover={voiceover} cards={cards:?}"
                );
            }
        }
    }
}

#[test]
fn clipping_flag_matches_threshold() {
    let mixer = AudioMixer::default();
    for voice in [0.5, 0.9, 1.0] {
        for background in [0.05, 0.1, 0.2, 0.3, 0.8] {
            let volumes = MixVolumes {
                voice,
                background,
                ..Default::default()
            };
            let sum = voice + background;
            let report = mixer.check_audio_clipping(&volumes);
            assert_eq!(report.will_clip, sum > SAFE_MIXING_THRESHOLD, "sum={sum}");
        }
    }
}

#[test]
fn limits_can_be_overridden_per_mixer() {
    let strict = AudioMixer::new(VolumeLimits {
        background_max: 0.1,
        ..Default::default()
    });
    assert_eq!(strict.normalize_volume(AudioRole::Background, Some(0.2)), 0.1);
    assert_eq!(AudioMixer::default().normalize_volume(AudioRole::Background, Some(0.2)), 0.2);
}

#[test]
fn fade_out_start_stays_in_segment() {
    for duration in [0.0, 0.5, 5.0, 40.0] {
        for fade in [0.0, 1.0, 3.0, 50.0] {
            let start = fade_out_start(duration, fade);
            assert!(start >= 0.0 && start <= duration);
        }
    }
}

#[test]
fn session_id_recovered_from_paths() {
    let resolver = AssetResolver::new(std::env::temp_dir());
    for path in [
        resolver.output_video_path(),
        resolver.voiceover_path("short"),
        resolver.image_path(3, "webp"),
    ] {
        assert_eq!(parse_session_id(&path).as_ref(), Some(resolver.session()));
    }
}

#[test]
fn full_graph_for_scenario_b() {
    let timeline = plan_timeline(&request(3, 30.0, Some((5.0, 5.0)))).unwrap();
    let mixer = AudioMixer::default();
    let sources = GraphSources {
        images: vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()],
        code_image: Some(PathBuf::from("code.png")),
        voice: Some(AudioTrack::new(AudioRole::Voice, "voice.mp3", 1.0)),
        background: Some(
            AudioTrack::new(AudioRole::Background, "bed.mp3", 0.15).with_fades(2.0, 2.0),
        ),
        ..Default::default()
    };

    let built = GraphBuilder::new(Resolution::new(1920, 1080), 30)
        .with_corner_overlay(true)
        .with_outro_code(true)
        .with_mixer(mixer)
        .build(&timeline, &sources)
        .unwrap();

    built.graph.validate(built.inputs.len()).unwrap();
    let fc = built.graph.to_filter_complex();
    assert_eq!(fc.matches("xfade=").count(), 2);
    assert_eq!(fc.matches("split=2").count(), 1);
    assert!(fc.contains("amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[aout]"));

    let voice_idx = built.inputs.index_of(InputRole::Voice).unwrap();
    let bg_idx = built.inputs.index_of(InputRole::Background).unwrap();
    assert!(fc.contains(&format!("[{}:a]volume=1", voice_idx)));
    assert!(fc.contains(&format!("[{}:a]aloop", bg_idx)));
    assert_eq!(built.output_pins(), vec!["[vout]", "[aout]"]);
}
