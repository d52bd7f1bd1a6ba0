//! End-to-end listener runs: energy VAD → segments → features → matcher.

mod common;

use std::sync::atomic::AtomicBool;

use common::{FRAME, padded, phrase};
use wakeprint::{
    Config, Enroller, Listener, ListenerEvent, ListenerMetrics, Rejection, SegmentEvent,
    Segmenter, SharedTemplates, TemplateSet, VecSource, WakeprintError,
    audio::AudioSource,
    segment::FlushReason,
    vad::EnergyClassifier,
};

/* ───────────────────────────── helpers ────────────────────────────── */

fn cfg() -> Config {
    Config::default()
}

fn source(pcm: &[i16]) -> VecSource {
    VecSource::from_samples(pcm, FRAME)
}

fn tail_s() -> f32 {
    cfg().flush_tail_ms() as f32 / 1_000.0
}

/// Three gain variants of the same utterance, enrolled through the
/// regular segmentation path.
fn enrolled() -> TemplateSet {
    let mut enroller = Enroller::new(EnergyClassifier::default(), &cfg()).unwrap();
    let mut set = TemplateSet::new(enroller.feature_dim());
    for gain in [0.30, 0.25, 0.35] {
        let pcm = padded(0.3, &phrase(0.8, gain), tail_s());
        let seq = enroller
            .capture(&mut source(&pcm))
            .unwrap()
            .expect("utterance should close a segment");
        set.push(seq).unwrap();
    }
    set
}

fn run_all(pcm: &[i16], templates: TemplateSet) -> (Vec<ListenerEvent>, std::sync::Arc<ListenerMetrics>) {
    let mut listener = Listener::new(EnergyClassifier::default(), &cfg()).unwrap();
    let shared = SharedTemplates::new(templates);
    let running = AtomicBool::new(true);
    let mut events = Vec::new();
    listener
        .run_events(&mut source(pcm), &shared, &running, |ev| events.push(ev))
        .unwrap();
    (events, listener.metrics())
}

/* ───────────────────────────── scenarios ──────────────────────────── */

#[test]
fn enrolled_phrase_wakes_exactly_once() {
    let set = enrolled();
    assert!(set.consistency(20).unwrap() > 0.95);

    let pcm = padded(0.5, &phrase(0.8, 0.3), tail_s());
    let mut listener = Listener::new(EnergyClassifier::default(), &cfg()).unwrap();
    let shared = SharedTemplates::new(set);
    let running = AtomicBool::new(true);
    let mut wakes = Vec::new();
    listener
        .run(&mut source(&pcm), &shared, &running, |d| wakes.push(d))
        .unwrap();

    assert_eq!(wakes.len(), 1);
    assert!(wakes[0].confidence >= 0.8);
    let m = listener.metrics();
    assert_eq!(ListenerMetrics::get(&m.wakes), 1);
    assert_eq!(ListenerMetrics::get(&m.segments_flushed), 1);
    assert_eq!(ListenerMetrics::get(&m.match_iterations), 1);
}

#[test]
fn two_utterances_wake_twice() {
    let mut pcm = padded(0.3, &phrase(0.8, 0.3), tail_s());
    pcm.extend(padded(0.2, &phrase(0.8, 0.28), tail_s()));
    let (events, _) = run_all(&pcm, enrolled());
    let wakes = events
        .iter()
        .filter(|e| matches!(e, ListenerEvent::Wake(_)))
        .count();
    assert_eq!(wakes, 2);
}

#[test]
fn short_burst_is_dropped_unscored() {
    let pcm = padded(0.3, &phrase(0.15, 0.3), tail_s());
    let (events, m) = run_all(&pcm, enrolled());
    assert!(matches!(
        events.as_slice(),
        [ListenerEvent::DroppedShort { speech_ms }] if *speech_ms < 250.0
    ));
    assert_eq!(ListenerMetrics::get(&m.segments_dropped_short), 1);
    assert_eq!(ListenerMetrics::get(&m.match_iterations), 0);
}

#[test]
fn silence_only_produces_nothing() {
    let pcm = vec![0i16; 16_000];
    let (events, m) = run_all(&pcm, enrolled());
    assert!(events.is_empty());
    assert_eq!(ListenerMetrics::get(&m.frames_processed), 32);
    assert_eq!(ListenerMetrics::get(&m.speech_frames), 0);
}

#[test]
fn empty_enrollment_rejects_segments() {
    let pcm = padded(0.3, &phrase(0.8, 0.3), tail_s());
    let (events, _) = run_all(&pcm, TemplateSet::new(39));
    assert_eq!(events, vec![ListenerEvent::Rejected(Rejection::NoTemplates)]);
}

#[test]
fn mismatched_feature_width_asks_for_re_enrollment() {
    let mut set = TemplateSet::new(26);
    set.templates.push(vec![0.0; 26 * 10]);
    let pcm = padded(0.3, &phrase(0.8, 0.3), tail_s());
    let (events, _) = run_all(&pcm, set);
    assert_eq!(
        events,
        vec![ListenerEvent::Rejected(Rejection::IncompatibleTemplates)]
    );
}

#[test]
fn cleared_flag_stops_before_first_frame() {
    let mut listener = Listener::new(EnergyClassifier::default(), &cfg()).unwrap();
    let running = AtomicBool::new(false);
    let mut src = source(&phrase(1.0, 0.3));
    listener
        .run(&mut src, &SharedTemplates::new(enrolled()), &running, |_| {
            panic!("no frame should be processed")
        })
        .unwrap();
    assert_eq!(ListenerMetrics::get(&listener.metrics().frames_processed), 0);
    assert!(src.read_frame().unwrap().is_some());
}

#[test]
fn continuous_speech_is_cut_at_max_duration() {
    let mut seg = Segmenter::new(EnergyClassifier::default(), &cfg()).unwrap();
    let mut src = source(&phrase(3.0, 0.3));
    let mut first = None;
    let mut i = 0usize;
    while let Some(frame) = src.read_frame().unwrap() {
        if let Some(SegmentEvent::Closed(c)) = seg.push(&frame) {
            first = Some((i, c));
            break;
        }
        i += 1;
    }
    let (i, closed) = first.expect("segment should be forced closed");
    // gate opens on the third frame, 63 speech frames reach 2000 ms
    assert_eq!(i, 2 + 62);
    assert_eq!(closed.reason, FlushReason::MaxDuration);
    assert!(closed.speech_ms >= 2_000.0);
    assert!(!seg.gate().is_speaking());
}

#[test]
fn spawned_listener_streams_events() {
    let pcm = padded(0.3, &phrase(0.8, 0.3), tail_s());
    let handle = Listener::spawn(
        cfg(),
        || Ok(EnergyClassifier::default()),
        move || Ok(VecSource::from_samples(&pcm, FRAME)),
        SharedTemplates::new(enrolled()),
    )
    .unwrap();

    // the sender is dropped when the source runs dry
    let events: Vec<ListenerEvent> = handle.events().iter().collect();
    assert!(matches!(events.as_slice(), [ListenerEvent::Wake(_)]));
    assert_eq!(ListenerMetrics::get(&handle.metrics().wakes), 1);
    handle.stop().unwrap();
}

#[test]
fn spawn_reports_construction_errors() {
    let res = Listener::<EnergyClassifier>::spawn(
        cfg(),
        || Err(WakeprintError::Device("no such classifier".into())),
        || Ok(VecSource::default()),
        SharedTemplates::new(TemplateSet::new(39)),
    );
    assert!(matches!(res, Err(WakeprintError::Device(_))));
}
