//! Speech segmentation.
//!
//! [`SegmentAccumulator`] is the `Idle → Accumulating → flush → Idle`
//! state machine over debounced VAD decisions. [`Segmenter`] pairs it with
//! a [`VoiceActivityGate`] and resets the gate on every flush; both the
//! live listener and enrollment drive audio through it.

use log::trace;
use wakeprint_vad::{SpeechClassifier, VoiceActivityGate};

use crate::{Config, Result, audio::rms, config::ms_to_samples};

/// Exponentially smoothed RMS of recent non-speech frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseFloor {
    value: f32,
    alpha: f32,
    primed: bool,
}

impl NoiseFloor {
    pub fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            primed: false,
        }
    }

    /// Fold one frame level in. The first observation seeds the average.
    pub fn update(&mut self, level: f32) {
        if self.primed {
            self.value += self.alpha * (level - self.value);
        } else {
            self.value = level;
            self.primed = true;
        }
    }

    /// Current estimate; `0.0` before any update.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Idle,
    Accumulating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Trailing silence reached `end_silence_ms`.
    EndOfSpeech,
    /// Accumulated speech reached `max_segment_ms`.
    MaxDuration,
}

/// A closed segment, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSegment {
    pub pcm: Vec<i16>,
    pub speech_ms: f32,
    /// Noise floor at the moment of the flush.
    pub noise_floor: f32,
    pub reason: FlushReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// Speech confirmed; a new segment started.
    Started,
    Closed(ClosedSegment),
    /// Flushed with less than `min_segment_ms` of speech; never scored.
    DroppedShort { speech_ms: f32 },
}

/// Collects debounced speech frames into segments.
///
/// Only speech frames are kept; silence while accumulating only advances
/// the trailing-silence counter. The PCM buffer is sized for
/// `max_segment_ms` up front and never grows past it.
#[derive(Debug)]
pub struct SegmentAccumulator {
    state: AccumulatorState,
    pcm: Vec<i16>,
    capacity: usize,
    frame_ms: f32,
    speech_ms: f32,
    silence_ms: f32,
    min_segment_ms: f32,
    max_segment_ms: f32,
    end_silence_ms: f32,
    noise: NoiseFloor,
}

impl SegmentAccumulator {
    pub fn new(cfg: &Config) -> Self {
        let s = &cfg.segment;
        let frame = cfg.audio.frame_size.max(1);
        // whole frames until the max-duration check fires
        let capacity = ms_to_samples(s.max_segment_ms, cfg.audio.sample_rate)
            .div_ceil(frame)
            .max(1)
            * frame;
        Self {
            state: AccumulatorState::Idle,
            pcm: Vec::with_capacity(capacity),
            capacity,
            frame_ms: cfg.frame_ms(),
            speech_ms: 0.0,
            silence_ms: 0.0,
            min_segment_ms: s.min_segment_ms as f32,
            max_segment_ms: s.max_segment_ms as f32,
            end_silence_ms: s.end_silence_ms as f32,
            noise: NoiseFloor::new(s.noise_ema_alpha),
        }
    }

    /// Feed one frame with its debounced decision (`speech`) and the raw
    /// classification of the same frame (`raw_speech`).
    ///
    /// The noise floor only moves while idle and only when neither the
    /// debounced nor the raw decision says speech.
    pub fn push(&mut self, frame: &[i16], speech: bool, raw_speech: bool) -> Option<SegmentEvent> {
        match (self.state, speech) {
            (AccumulatorState::Idle, false) => {
                if !raw_speech {
                    self.noise.update(rms(frame));
                }
                None
            }
            (AccumulatorState::Idle, true) => {
                self.state = AccumulatorState::Accumulating;
                self.pcm.clear();
                self.speech_ms = 0.0;
                self.silence_ms = 0.0;
                self.append(frame);
                trace!("segment started");
                if self.speech_ms >= self.max_segment_ms {
                    return Some(self.flush(FlushReason::MaxDuration));
                }
                Some(SegmentEvent::Started)
            }
            (AccumulatorState::Accumulating, true) => {
                self.append(frame);
                self.silence_ms = 0.0;
                (self.speech_ms >= self.max_segment_ms).then(|| self.flush(FlushReason::MaxDuration))
            }
            (AccumulatorState::Accumulating, false) => {
                self.silence_ms += self.frame_ms;
                (self.silence_ms >= self.end_silence_ms).then(|| self.flush(FlushReason::EndOfSpeech))
            }
        }
    }

    fn append(&mut self, frame: &[i16]) {
        let room = self.capacity - self.pcm.len();
        self.pcm.extend_from_slice(&frame[..frame.len().min(room)]);
        self.speech_ms += self.frame_ms;
    }

    fn flush(&mut self, reason: FlushReason) -> SegmentEvent {
        let speech_ms = self.speech_ms;
        let event = if speech_ms < self.min_segment_ms {
            self.pcm.clear();
            SegmentEvent::DroppedShort { speech_ms }
        } else {
            let pcm = std::mem::replace(&mut self.pcm, Vec::with_capacity(self.capacity));
            SegmentEvent::Closed(ClosedSegment {
                pcm,
                speech_ms,
                noise_floor: self.noise.value(),
                reason,
            })
        };
        self.state = AccumulatorState::Idle;
        self.speech_ms = 0.0;
        self.silence_ms = 0.0;
        trace!("segment flushed ({reason:?}, {speech_ms:.0} ms)");
        event
    }

    /// Abandon any partial segment. The noise floor is kept.
    pub fn reset(&mut self) {
        self.state = AccumulatorState::Idle;
        self.pcm.clear();
        self.speech_ms = 0.0;
        self.silence_ms = 0.0;
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise.value()
    }

    pub fn speech_ms(&self) -> f32 {
        self.speech_ms
    }

    pub fn trailing_silence_ms(&self) -> f32 {
        self.silence_ms
    }

    /// Samples the buffer was sized for.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Gate plus accumulator: raw frames in, segment events out.
pub struct Segmenter<C> {
    gate: VoiceActivityGate<C>,
    accumulator: SegmentAccumulator,
}

impl<C: SpeechClassifier> Segmenter<C> {
    pub fn new(classifier: C, cfg: &Config) -> Result<Self> {
        Ok(Self {
            gate: VoiceActivityGate::new(classifier, &cfg.gate_config())?,
            accumulator: SegmentAccumulator::new(cfg),
        })
    }

    /// Classify one frame and advance the state machine. Any flush resets
    /// the gate, whatever happens to the segment afterwards.
    pub fn push(&mut self, frame: &[i16]) -> Option<SegmentEvent> {
        let speech = self.gate.is_speech(frame);
        let raw = self.gate.last_frame_was_speech();
        let event = self.accumulator.push(frame, speech, raw);
        if matches!(
            event,
            Some(SegmentEvent::Closed(_) | SegmentEvent::DroppedShort { .. })
        ) {
            self.gate.reset();
        }
        event
    }

    pub fn reset(&mut self) {
        self.gate.reset();
        self.accumulator.reset();
    }

    pub fn gate(&self) -> &VoiceActivityGate<C> {
        &self.gate
    }

    pub fn accumulator(&self) -> &SegmentAccumulator {
        &self.accumulator
    }
}
