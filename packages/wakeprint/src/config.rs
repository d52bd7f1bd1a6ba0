//! Listener configuration.
//!
//! One immutable [`Config`] is handed to the listener at construction. Each
//! component copies what it needs; replacing the configuration means
//! building a new listener. Every field has a default, so a TOML file only
//! needs the values it wants to change:
//!
//! ```toml
//! [vad]
//! severity = "aggressive"
//!
//! [matcher]
//! similarity_threshold = 0.85
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use wakeprint_vad::{GateConfig, VadSeverity};

use crate::{Result, WakeprintError, constants::*};

/// Capture format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per VAD decision.
    pub frame_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

/// Voice-activity gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub severity: VadSeverity,
    pub speech_confirm_ms: u32,
    pub silence_confirm_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            severity: VadSeverity::Normal,
            speech_confirm_ms: DEFAULT_SPEECH_CONFIRM_MS,
            silence_confirm_ms: DEFAULT_SILENCE_CONFIRM_MS,
        }
    }
}

/// Segment accumulation and noise floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Segments with less accumulated speech are dropped unscored.
    pub min_segment_ms: u32,
    /// Accumulated speech at which a segment is cut off.
    pub max_segment_ms: u32,
    /// Trailing silence that closes a segment.
    pub end_silence_ms: u32,
    /// Smoothing factor of the noise-floor EMA, in `(0, 1]`.
    pub noise_ema_alpha: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_segment_ms: DEFAULT_MIN_SEGMENT_MS,
            max_segment_ms: DEFAULT_MAX_SEGMENT_MS,
            end_silence_ms: DEFAULT_END_SILENCE_MS,
            noise_ema_alpha: DEFAULT_NOISE_EMA_ALPHA,
        }
    }
}

/// Cepstral front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub frame_len_ms: u32,
    pub frame_shift_ms: u32,
    pub fft_size: usize,
    pub pre_emphasis: f32,
    pub mel_bands: usize,
    pub mel_low_hz: f32,
    pub mel_high_hz: f32,
    pub coeffs: usize,
    /// Longer sequences are average-pooled down to this many frames.
    pub max_frames: usize,
    /// Longer inputs are cropped to a centered window of this length.
    pub max_utterance_ms: u32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame_len_ms: KFC_FRAME_LEN_MS,
            frame_shift_ms: KFC_FRAME_SHIFT_MS,
            fft_size: KFC_FFT_SIZE,
            pre_emphasis: PRE_EMPHASIS,
            mel_bands: MEL_BANDS,
            mel_low_hz: MEL_LOW_HZ,
            mel_high_hz: MEL_HIGH_HZ,
            coeffs: KFC_COEFFS,
            max_frames: DEFAULT_MAX_FEATURE_FRAMES,
            max_utterance_ms: DEFAULT_MAX_UTTERANCE_MS,
        }
    }
}

impl FeatureConfig {
    /// Width of one feature vector.
    #[inline]
    pub const fn dim(&self) -> usize {
        feature_dim(self.coeffs)
    }

    pub fn frame_len(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.frame_len_ms, sample_rate)
    }

    pub fn hop_len(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.frame_shift_ms, sample_rate)
    }
}

/// Template scoring and gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub similarity_threshold: f32,
    pub dynamic_threshold_margin: f32,
    pub min_dynamic_threshold: f32,
    /// Minimum Sakoe-Chiba half-width (frames).
    pub dtw_band: usize,
    pub required_matches: usize,
    pub min_duration_ratio: f32,
    pub max_duration_ratio: f32,
    pub max_best_second_gap: f32,
    pub min_rms: f32,
    pub rms_noise_margin: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dynamic_threshold_margin: DEFAULT_DYNAMIC_THRESHOLD_MARGIN,
            min_dynamic_threshold: DEFAULT_MIN_DYNAMIC_THRESHOLD,
            dtw_band: DEFAULT_DTW_BAND,
            required_matches: DEFAULT_REQUIRED_MATCHES,
            min_duration_ratio: DEFAULT_MIN_DURATION_RATIO,
            max_duration_ratio: DEFAULT_MAX_DURATION_RATIO,
            max_best_second_gap: DEFAULT_MAX_BEST_SECOND_GAP,
            min_rms: DEFAULT_MIN_RMS,
            rms_noise_margin: DEFAULT_RMS_NOISE_MARGIN,
        }
    }
}

/// Complete listener configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub segment: SegmentConfig,
    pub features: FeatureConfig,
    pub matcher: MatcherConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Duration of one VAD frame in milliseconds.
    pub fn frame_ms(&self) -> f32 {
        self.audio.frame_size as f32 * 1_000.0 / self.audio.sample_rate as f32
    }

    /// Silence needed after the last spoken frame for a segment to close:
    /// gate release plus end-of-speech window, with a frame of slack each.
    pub fn flush_tail_ms(&self) -> u32 {
        let frame = self.frame_ms().ceil() as u32;
        self.vad.silence_confirm_ms + self.segment.end_silence_ms + 2 * frame
    }

    /// Parameters for the voice-activity gate.
    pub fn gate_config(&self) -> GateConfig {
        GateConfig::builder()
            .sample_rate(self.audio.sample_rate)
            .frame_size(self.audio.frame_size)
            .severity(self.vad.severity)
            .speech_duration_ms(self.vad.speech_confirm_ms)
            .silence_duration_ms(self.vad.silence_confirm_ms)
            .build()
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.audio;
        let s = &self.segment;
        let f = &self.features;
        let m = &self.matcher;

        ensure(a.sample_rate > 0, "audio.sample_rate must be > 0")?;
        ensure(a.frame_size > 0, "audio.frame_size must be > 0")?;

        ensure(
            s.min_segment_ms <= s.max_segment_ms,
            "segment.min_segment_ms must not exceed segment.max_segment_ms",
        )?;
        ensure(s.max_segment_ms > 0, "segment.max_segment_ms must be > 0")?;
        ensure(
            s.noise_ema_alpha > 0.0 && s.noise_ema_alpha <= 1.0,
            "segment.noise_ema_alpha must be in (0, 1]",
        )?;

        let frame_len = f.frame_len(a.sample_rate);
        ensure(frame_len > 0, "features.frame_len_ms is too short")?;
        ensure(f.hop_len(a.sample_rate) > 0, "features.frame_shift_ms is too short")?;
        ensure(
            frame_len <= f.fft_size,
            "features.fft_size must hold one analysis frame",
        )?;
        ensure(f.mel_bands > 0, "features.mel_bands must be > 0")?;
        ensure(
            f.coeffs > 0 && f.coeffs <= f.mel_bands,
            "features.coeffs must be in 1..=mel_bands",
        )?;
        ensure(
            f.mel_low_hz >= 0.0 && f.mel_low_hz < f.mel_high_hz,
            "features.mel_low_hz must be below mel_high_hz",
        )?;
        ensure(
            f.mel_high_hz <= a.sample_rate as f32 / 2.0,
            "features.mel_high_hz must not exceed Nyquist",
        )?;
        ensure(f.max_frames > 0, "features.max_frames must be > 0")?;
        ensure(f.max_utterance_ms > 0, "features.max_utterance_ms must be > 0")?;
        ensure(
            (0.0..1.0).contains(&f.pre_emphasis),
            "features.pre_emphasis must be in [0, 1)",
        )?;

        ensure(
            (0.0..=1.0).contains(&m.similarity_threshold),
            "matcher.similarity_threshold must be in [0, 1]",
        )?;
        ensure(
            m.min_dynamic_threshold <= m.similarity_threshold,
            "matcher.min_dynamic_threshold must not exceed similarity_threshold",
        )?;
        ensure(
            m.dynamic_threshold_margin >= 0.0,
            "matcher.dynamic_threshold_margin must be >= 0",
        )?;
        ensure(m.required_matches > 0, "matcher.required_matches must be > 0")?;
        ensure(
            m.min_duration_ratio > 0.0 && m.min_duration_ratio <= m.max_duration_ratio,
            "matcher duration ratio range is empty",
        )?;
        ensure(
            m.max_best_second_gap >= 0.0,
            "matcher.max_best_second_gap must be >= 0",
        )?;
        ensure(
            m.min_rms >= 0.0 && m.rms_noise_margin >= 0.0,
            "matcher RMS limits must be >= 0",
        )?;
        Ok(())
    }
}

/// `ms` at `sample_rate`, rounded down.
pub(crate) fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1_000) as usize
}

fn ensure(ok: bool, msg: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(WakeprintError::InvalidConfig(msg.to_owned()))
    }
}
