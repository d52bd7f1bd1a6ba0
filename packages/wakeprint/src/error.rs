use thiserror::Error;

/// Every fallible wakeprint operation returns this.
///
/// Per-frame and per-segment problems never surface here; they become a
/// [`Rejection`](crate::Rejection) or a skipped frame. These errors come from
/// construction, I/O and the audio device.
#[derive(Debug, Error)]
pub enum WakeprintError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("config parse: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("unsupported wav format: {0}")]
    WavFormat(String),
    #[error("audio device: {0}")]
    Device(String),
    #[error("vad: {0}")]
    Vad(#[from] wakeprint_vad::VadError),
    #[error("cbor: {0}")]
    Cbor(String),
    #[error("template set: {0}")]
    Templates(String),
    #[error("no usable speech segment in {0}")]
    NoSpeech(String),
    #[error("listener thread: {0}")]
    Thread(String),
}

/// Result alias used across the public API.
pub type Result<T> = std::result::Result<T, WakeprintError>;
