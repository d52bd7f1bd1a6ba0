//! Voice-activity front-end for wakeprint.
//!
//! A [`SpeechClassifier`] turns one padded PCM window into a speech
//! probability; the [`VoiceActivityGate`] owns the sliding context window
//! that feeds it and debounces the thresholded result so a single
//! flickering frame never toggles the speech/silence state.

mod classifier;
mod energy;
mod error;
mod gate;
mod severity;
#[cfg(feature = "silero")]
mod silero;

pub use classifier::SpeechClassifier;
pub use energy::EnergyClassifier;
pub use error::{ClassifierError, VadError};
pub use gate::{GateConfig, GateConfigBuilder, SaturatingRun, VoiceActivityGate};
pub use severity::VadSeverity;
#[cfg(feature = "silero")]
pub use silero::SileroClassifier;

/// Scale factor for signed 16-bit PCM → `[-1, 1)` floats.
pub const I16_SCALE: f32 = 32_768.0;
