//! Wakeprint – public crate root
//! ==============================
//! Speaker-dependent **personal wake-phrase** detector.
//!
//! * A [`VoiceActivityGate`](wakeprint_vad::VoiceActivityGate) debounces a
//!   per-frame speech classifier.
//! * The [`SegmentAccumulator`] turns debounced speech into closed segments.
//! * The [`FeatureExtractor`] reduces each segment to a CMVN-normalised
//!   cepstral sequence.
//! * The [`TemplateMatcher`] aligns it against the user's enrolled
//!   templates with banded DTW and decides.
//!
//! [`Listener`] strings these together over any [`AudioSource`]; enrollment
//! ([`enroll_files`]) runs recordings through the same path.
#![deny(unsafe_code)]

/* ────────────────────────  sub-modules  ─────────────────────────────── */
pub mod audio;
pub mod config;
pub mod constants;
mod error;
pub mod kfc;
pub mod listener;
pub mod matcher;
pub mod segment;
pub mod templates;

/* ───────────────────────── public façade ─────────────────────────────── */
pub use audio::{AudioSource, MicrophoneSource, VecSource, WavFileSource};
pub use config::Config;
pub use error::{Result, WakeprintError};
pub use kfc::{FeatureExtractor, FeatureSequence};
pub use listener::{Listener, ListenerEvent, ListenerHandle, ListenerMetrics};
pub use matcher::{MatchOutcome, Rejection, TemplateMatcher, WakeDecision};
pub use segment::{ClosedSegment, NoiseFloor, SegmentAccumulator, SegmentEvent, Segmenter};
pub use templates::{
    Enroller, SharedTemplates, Template, TemplateLoad, TemplateSave, TemplateSet, enroll_files,
};

pub use wakeprint_vad as vad;
