use std::{fs::File, io::BufReader, path::Path};

use hound::{SampleFormat, WavReader};

use super::AudioSource;
use crate::{Result, WakeprintError, config::AudioConfig};

/// Mono 16-bit WAV replayed as frames, followed by a run of silence.
///
/// The trailing silence lets an utterance that runs to the end of the file
/// close through the normal end-of-speech rule.
pub struct WavFileSource {
    reader: WavReader<BufReader<File>>,
    frame_size: usize,
    tail_frames: usize,
    exhausted: bool,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, audio: &AudioConfig, tail_silence_ms: u32) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != SampleFormat::Int
        {
            return Err(WakeprintError::WavFormat(format!(
                "{}: need mono 16-bit PCM, got {} ch / {} bit {:?}",
                path.display(),
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format
            )));
        }
        if spec.sample_rate != audio.sample_rate {
            return Err(WakeprintError::WavFormat(format!(
                "{}: sample rate {} Hz, expected {} Hz",
                path.display(),
                spec.sample_rate,
                audio.sample_rate
            )));
        }
        let samples = tail_silence_ms as u64 * audio.sample_rate as u64 / 1_000;
        Ok(Self {
            reader,
            frame_size: audio.frame_size,
            tail_frames: (samples as usize).div_ceil(audio.frame_size),
            exhausted: false,
        })
    }
}

impl AudioSource for WavFileSource {
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        if !self.exhausted {
            let mut frame = Vec::with_capacity(self.frame_size);
            for s in self.reader.samples::<i16>().take(self.frame_size) {
                frame.push(s?);
            }
            if !frame.is_empty() {
                frame.resize(self.frame_size, 0);
                return Ok(Some(frame));
            }
            self.exhausted = true;
        }
        if self.tail_frames > 0 {
            self.tail_frames -= 1;
            return Ok(Some(vec![0; self.frame_size]));
        }
        Ok(None)
    }
}

/// Write mono 16-bit PCM; used by tests and the `score` tooling.
pub fn write_wav(path: impl AsRef<Path>, sample_rate: u32, pcm: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec)?;
    for &s in pcm {
        w.write_sample(s)?;
    }
    w.finalize()?;
    Ok(())
}
