use thiserror::Error;

/// Failure of a single classifier invocation.
///
/// The gate never propagates these: the frame is treated as silence and
/// the stream carries on.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend failed: {0}")]
    Backend(String),
    #[error("window length {given} does not match expected {expected}")]
    BadWindow { given: usize, expected: usize },
    #[error("classifier returned a non-finite probability")]
    NonFinite,
}

/// Construction-time errors for the gate and the classifiers.
#[derive(Debug, Error)]
pub enum VadError {
    #[error("sample rate {sample_rate} Hz with frame size {frame_size} is not supported")]
    UnsupportedFormat { sample_rate: u32, frame_size: usize },
    #[error("sample rate {0} Hz is not supported by the classifier")]
    UnsupportedSampleRate(u32),
    #[error("frame size must be non-zero")]
    EmptyFrame,
    #[error("failed to load classifier model: {0}")]
    ModelLoad(String),
}
