mod microphone;
mod pcm;
mod source;
mod wav;

/* handy re-exports */
pub use microphone::{MicrophoneSource, input_device_names};
pub use pcm::{f32_to_i16, pcm_to_f32, rms};
pub use source::{AudioSource, VecSource};
pub use wav::{WavFileSource, write_wav};
