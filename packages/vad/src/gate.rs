//! Hysteresis gate on top of a [`SpeechClassifier`].
//!
//! Each call pads the new frame with the tail of the previous window,
//! asks the classifier for a probability, thresholds it by severity and
//! then debounces the result with two saturating run counters.

use log::{trace, warn};
use typed_builder::TypedBuilder;

use crate::{I16_SCALE, SpeechClassifier, VadError, VadSeverity};

/// Gate parameters. Durations are converted to whole frames, rounded up.
#[derive(Debug, Clone, TypedBuilder)]
pub struct GateConfig {
    #[builder(default = 16_000)]
    pub sample_rate: u32,
    /// Samples per decision.
    #[builder(default = 512)]
    pub frame_size: usize,
    #[builder(default)]
    pub severity: VadSeverity,
    /// Sustained speech needed before the gate opens.
    #[builder(default = 64)]
    pub speech_duration_ms: u32,
    /// Sustained silence needed before the gate closes.
    #[builder(default = 96)]
    pub silence_duration_ms: u32,
}

impl GateConfig {
    /// Duration of one frame in milliseconds.
    pub fn frame_ms(&self) -> f32 {
        self.frame_size as f32 * 1_000.0 / self.sample_rate as f32
    }

    /// `ceil(ms / frame_ms)` in integer arithmetic.
    pub fn frames_for(&self, ms: u32) -> u32 {
        let num = ms as u64 * self.sample_rate as u64;
        let den = 1_000 * self.frame_size as u64;
        num.div_ceil(den) as u32
    }
}

/// Run-length counter that saturates one step past its limit.
///
/// `bump` increments, then compares; the counter never grows beyond
/// `limit + 1`, the first value that exceeds the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturatingRun {
    run: u32,
    limit: u32,
}

impl SaturatingRun {
    pub const fn new(limit: u32) -> Self {
        Self { run: 0, limit }
    }

    /// Count one more frame; returns whether the run now exceeds the limit.
    #[inline]
    pub fn bump(&mut self) -> bool {
        if self.run <= self.limit {
            self.run += 1;
        }
        self.exceeded()
    }

    #[inline]
    pub const fn exceeded(&self) -> bool {
        self.run > self.limit
    }

    #[inline]
    pub fn clear(&mut self) {
        self.run = 0;
    }

    #[inline]
    pub const fn value(&self) -> u32 {
        self.run
    }

    #[inline]
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

/// Debounced speech/silence decision per frame.
pub struct VoiceActivityGate<C> {
    classifier: C,
    cutoff: Option<f32>,
    frame_size: usize,
    context: Vec<f32>,
    window: Vec<f32>,
    speech_run: SaturatingRun,
    silence_run: SaturatingRun,
    speaking: bool,
    last_raw: bool,
    failures: u64,
}

impl<C: SpeechClassifier> VoiceActivityGate<C> {
    pub fn new(classifier: C, cfg: &GateConfig) -> Result<Self, VadError> {
        if cfg.frame_size == 0 {
            return Err(VadError::EmptyFrame);
        }
        if cfg.sample_rate == 0 || !classifier.supports_frame(cfg.frame_size) {
            return Err(VadError::UnsupportedFormat {
                sample_rate: cfg.sample_rate,
                frame_size: cfg.frame_size,
            });
        }
        let ctx = classifier.context_size();
        Ok(Self {
            classifier,
            cutoff: cfg.severity.cutoff(),
            frame_size: cfg.frame_size,
            context: vec![0.0; ctx],
            window: Vec::with_capacity(ctx + cfg.frame_size),
            speech_run: SaturatingRun::new(cfg.frames_for(cfg.speech_duration_ms)),
            silence_run: SaturatingRun::new(cfg.frames_for(cfg.silence_duration_ms)),
            speaking: false,
            last_raw: false,
            failures: 0,
        })
    }

    /// Feed one frame; returns the debounced state after it.
    pub fn is_speech(&mut self, frame: &[i16]) -> bool {
        let raw = self.classify(frame);
        self.last_raw = raw;

        if raw {
            self.silence_run.clear();
            if self.speech_run.bump() {
                self.speaking = true;
            }
        } else {
            self.speech_run.clear();
            if self.silence_run.bump() && self.speaking {
                self.speaking = false;
                self.speech_run.clear();
                self.silence_run.clear();
            }
        }
        self.speaking
    }

    /// Zero both runs, the context window and the classifier state.
    pub fn reset(&mut self) {
        self.speech_run.clear();
        self.silence_run.clear();
        self.speaking = false;
        self.last_raw = false;
        self.context.fill(0.0);
        self.classifier.reset();
    }

    /// Thresholded classifier output for the last frame, before debouncing.
    #[inline]
    pub fn last_frame_was_speech(&self) -> bool {
        self.last_raw
    }

    #[inline]
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of classifier calls that failed and were counted as silence.
    #[inline]
    pub fn classifier_failures(&self) -> u64 {
        self.failures
    }

    pub fn speech_run(&self) -> SaturatingRun {
        self.speech_run
    }

    pub fn silence_run(&self) -> SaturatingRun {
        self.silence_run
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    fn classify(&mut self, frame: &[i16]) -> bool {
        if frame.len() != self.frame_size {
            trace!(
                "frame of {} samples (expected {}) treated as silence",
                frame.len(),
                self.frame_size
            );
            return false;
        }
        let Some(cutoff) = self.cutoff else {
            return false;
        };

        self.window.clear();
        self.window.extend_from_slice(&self.context);
        self.window
            .extend(frame.iter().map(|&s| s as f32 / I16_SCALE));

        let result = self.classifier.speech_probability(&self.window);

        // the tail of this window is the next call's context
        let ctx = self.context.len();
        if ctx > 0 {
            let tail = self.window.len() - ctx;
            self.context.copy_from_slice(&self.window[tail..]);
        }

        match result {
            Ok(p) => p >= cutoff,
            Err(e) => {
                self.failures += 1;
                warn!("speech classifier failed, frame treated as silence: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassifierError;

    /// Replays a fixed list of probabilities (or failures).
    struct Scripted {
        script: Vec<Option<f32>>,
        pos: usize,
    }

    impl Scripted {
        fn new(script: &[Option<f32>]) -> Self {
            Self {
                script: script.to_vec(),
                pos: 0,
            }
        }
    }

    impl SpeechClassifier for Scripted {
        fn context_size(&self) -> usize {
            0
        }
        fn speech_probability(&mut self, _w: &[f32]) -> Result<f32, ClassifierError> {
            let p = self.script.get(self.pos).copied().flatten();
            self.pos += 1;
            p.ok_or_else(|| ClassifierError::Backend("scripted failure".into()))
        }
        fn reset(&mut self) {}
    }

    fn cfg() -> GateConfig {
        // 32 ms frames: speech limit 2, silence limit 3
        GateConfig::builder()
            .speech_duration_ms(64)
            .silence_duration_ms(96)
            .build()
    }

    #[test]
    fn frames_for_rounds_up() {
        let c = cfg();
        assert_eq!(c.frames_for(64), 2);
        assert_eq!(c.frames_for(65), 3);
        assert_eq!(c.frames_for(0), 0);
        assert_eq!(c.frames_for(1), 1);
    }

    #[test]
    fn saturating_run_stops_one_past_limit() {
        let mut r = SaturatingRun::new(2);
        assert!(!r.bump());
        assert!(!r.bump());
        assert!(r.bump());
        assert!(r.bump());
        assert_eq!(r.value(), 3);
        r.clear();
        assert_eq!(r.value(), 0);
    }

    #[test]
    fn zero_limit_exceeds_on_first_bump() {
        let mut r = SaturatingRun::new(0);
        assert!(r.bump());
        assert_eq!(r.value(), 1);
    }

    #[test]
    fn speech_opens_after_run_exceeds_limit() {
        let s = Some(0.9);
        let mut gate = VoiceActivityGate::new(Scripted::new(&[s, s, s, s]), &cfg()).unwrap();
        let frame = [0i16; 512];
        assert!(!gate.is_speech(&frame));
        assert!(!gate.is_speech(&frame));
        assert!(gate.is_speech(&frame));
        assert!(gate.is_speech(&frame));
    }

    #[test]
    fn isolated_flicker_does_not_toggle() {
        let (s, n) = (Some(0.9), Some(0.1));
        let script = [s, n, s, n, s, n];
        let mut gate = VoiceActivityGate::new(Scripted::new(&script), &cfg()).unwrap();
        let frame = [0i16; 512];
        for _ in 0..script.len() {
            assert!(!gate.is_speech(&frame));
        }
    }

    #[test]
    fn closes_only_after_silence_run_exceeds_limit() {
        let (s, n) = (Some(0.9), Some(0.1));
        let script = [s, s, s, n, n, n, s, n, n, n, n];
        let mut gate = VoiceActivityGate::new(Scripted::new(&script), &cfg()).unwrap();
        let frame = [0i16; 512];
        let out: Vec<bool> = (0..script.len()).map(|_| gate.is_speech(&frame)).collect();
        assert_eq!(
            out,
            vec![false, false, true, true, true, true, true, true, true, true, false]
        );
        assert_eq!(gate.speech_run().value(), 0);
        assert_eq!(gate.silence_run().value(), 0);
    }

    #[test]
    fn wrong_length_and_failures_count_as_silence() {
        let mut gate =
            VoiceActivityGate::new(Scripted::new(&[None, Some(0.9)]), &cfg()).unwrap();
        assert!(!gate.is_speech(&[0i16; 10]));
        assert!(!gate.is_speech(&[0i16; 512]));
        assert!(!gate.last_frame_was_speech());
        assert_eq!(gate.classifier_failures(), 1);
        assert!(!gate.is_speech(&[0i16; 512]));
        assert!(gate.last_frame_was_speech());
    }

    #[test]
    fn off_never_calls_classifier() {
        let c = GateConfig::builder().severity(VadSeverity::Off).build();
        let mut gate = VoiceActivityGate::new(Scripted::new(&[]), &c).unwrap();
        for _ in 0..10 {
            assert!(!gate.is_speech(&[1000i16; 512]));
        }
        assert_eq!(gate.classifier().pos, 0);
    }

    #[test]
    fn severity_cutoffs_apply() {
        let c = GateConfig::builder()
            .severity(VadSeverity::Aggressive)
            .speech_duration_ms(0)
            .build();
        let mut gate =
            VoiceActivityGate::new(Scripted::new(&[Some(0.79), Some(0.8)]), &c).unwrap();
        assert!(!gate.is_speech(&[0i16; 512]));
        assert!(gate.is_speech(&[0i16; 512]));
    }

    /// Fixed-window model: 64 samples of context plus exactly 512 new ones.
    struct FixedWindow;

    impl SpeechClassifier for FixedWindow {
        fn context_size(&self) -> usize {
            64
        }
        fn supports_frame(&self, frame_size: usize) -> bool {
            frame_size == 512
        }
        fn speech_probability(&mut self, w: &[f32]) -> Result<f32, ClassifierError> {
            if w.len() == 576 {
                Ok(0.9)
            } else {
                Err(ClassifierError::BadWindow {
                    given: w.len(),
                    expected: 576,
                })
            }
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn frame_size_the_classifier_cannot_run_is_refused_up_front() {
        let c = GateConfig::builder().frame_size(256usize).build();
        assert!(matches!(
            VoiceActivityGate::new(FixedWindow, &c),
            Err(VadError::UnsupportedFormat {
                sample_rate: 16_000,
                frame_size: 256
            })
        ));

        let mut gate = VoiceActivityGate::new(FixedWindow, &cfg()).unwrap();
        for _ in 0..5 {
            gate.is_speech(&[0i16; 512]);
        }
        assert!(gate.is_speaking());
        assert_eq!(gate.classifier_failures(), 0);
    }

    #[test]
    fn rejects_zero_frame_size() {
        let c = GateConfig::builder().frame_size(0).build();
        assert!(matches!(
            VoiceActivityGate::new(Scripted::new(&[]), &c),
            Err(VadError::EmptyFrame)
        ));
    }
}
