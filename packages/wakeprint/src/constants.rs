//! Compile-time defaults for wakeprint.
//!
//!  * Everything here only seeds [`Config::default`](crate::Config); the
//!    running pipeline reads the config, never these constants directly.
//!  * Values are grouped the same way the config sections are.

/* --------------------------------------------------------------------- */
/*  Audio & VAD                                                           */

/// Capture sample-rate (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Samples per VAD decision (32 ms @ 16 kHz).
pub const DEFAULT_FRAME_SIZE: usize = 512;

/// Sustained speech before the gate opens.
pub const DEFAULT_SPEECH_CONFIRM_MS: u32 = 64;

/// Sustained silence before the gate closes.
pub const DEFAULT_SILENCE_CONFIRM_MS: u32 = 96;

/* --------------------------------------------------------------------- */
/*  Segmenting                                                            */

pub const DEFAULT_MIN_SEGMENT_MS: u32 = 250;
pub const DEFAULT_MAX_SEGMENT_MS: u32 = 2_000;
pub const DEFAULT_END_SILENCE_MS: u32 = 480;
/// EMA factor for the ambient noise floor.
pub const DEFAULT_NOISE_EMA_ALPHA: f32 = 0.05;

/* --------------------------------------------------------------------- */
/*  Cepstral front-end                                                    */

/// Analysis frame length (milliseconds).
pub const KFC_FRAME_LEN_MS: u32 = 25;

/// Analysis hop (milliseconds).
pub const KFC_FRAME_SHIFT_MS: u32 = 10;

/// FFT length; frames are zero-padded up to it.
pub const KFC_FFT_SIZE: usize = 512;

/// Pre-emphasis coefficient (first-order high-pass).
pub const PRE_EMPHASIS: f32 = 0.97;

/// Triangular mel bands.
pub const MEL_BANDS: usize = 40;
pub const MEL_LOW_HZ: f32 = 20.0;
pub const MEL_HIGH_HZ: f32 = 7_600.0;

/// Cepstral coefficients kept after the DCT.
pub const KFC_COEFFS: usize = 13;

/// Feature width: cepstra + delta + delta-delta.
pub const fn feature_dim(coeffs: usize) -> usize {
    coeffs * 3
}

/// Frames kept after average pooling.
pub const DEFAULT_MAX_FEATURE_FRAMES: usize = 120;

/// Longest stretch of audio turned into features (centered crop).
pub const DEFAULT_MAX_UTTERANCE_MS: u32 = 2_000;

/// Floor for logarithms and variances.
pub const LOG_EPSILON: f32 = 1e-10;

/* --------------------------------------------------------------------- */
/*  Template matching                                                     */

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.80;
pub const DEFAULT_DYNAMIC_THRESHOLD_MARGIN: f32 = 0.05;
pub const DEFAULT_MIN_DYNAMIC_THRESHOLD: f32 = 0.70;
/// Sakoe-Chiba half-width in frames.
pub const DEFAULT_DTW_BAND: usize = 20;
pub const DEFAULT_REQUIRED_MATCHES: usize = 1;
pub const DEFAULT_MIN_DURATION_RATIO: f32 = 0.5;
pub const DEFAULT_MAX_DURATION_RATIO: f32 = 2.0;
pub const DEFAULT_MAX_BEST_SECOND_GAP: f32 = 0.25;
/// Absolute RMS floor (full scale = 1.0).
pub const DEFAULT_MIN_RMS: f32 = 0.005;
pub const DEFAULT_RMS_NOISE_MARGIN: f32 = 0.004;

/* --------------------------------------------------------------------- */
/*  Storage                                                               */

/// Layout version written into template files.
/// Increment **whenever stored layout changes**.
pub const TEMPLATE_FILE_VERSION: u8 = 1;
