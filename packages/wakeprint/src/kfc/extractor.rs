#![allow(clippy::many_single_char_names)]

use std::{f32::consts::PI, sync::Arc};

use log::trace;
use rustfft::{Fft, FftPlanner, num_complex::Complex32};
use serde::{Deserialize, Serialize};

use super::{
    KfcNormalizer,
    mel::{DctTable, MelFilterBank},
};
use crate::{Config, Result, audio::pcm_to_f32, config::ms_to_samples, constants::LOG_EPSILON};

/// One utterance as a row-major `frames × dim` matrix.
///
/// Row order is time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSequence {
    data: Vec<f32>,
    dim: usize,
}

impl FeatureSequence {
    /// Wrap a flat buffer; `None` unless `dim > 0` and `data.len()` is a
    /// whole number of rows.
    pub fn from_flat(data: Vec<f32>, dim: usize) -> Option<Self> {
        (dim > 0 && data.len() % dim == 0).then_some(Self { data, dim })
    }

    pub fn empty(dim: usize) -> Self {
        Self {
            data: Vec::new(),
            dim,
        }
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn frame(&self, t: usize) -> &[f32] {
        &self.data[t * self.dim..(t + 1) * self.dim]
    }

    pub fn frames(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dim.max(1))
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    pub fn into_flat(self) -> Vec<f32> {
        self.data
    }

    /// Copy with every frame scaled to unit L2 norm.
    pub fn l2_normalized(&self) -> Self {
        let mut data = self.data.clone();
        KfcNormalizer::l2_rows(&mut data, self.dim);
        Self {
            data,
            dim: self.dim,
        }
    }
}

/// Cepstral feature extractor: int16 PCM → [`FeatureSequence`].
///
/// Window, filterbank, DCT basis and FFT plan are built once in `new`;
/// [`extract`](Self::extract) holds no state between calls, so identical
/// input always yields identical output.
///
/// Pipeline per call:
///  1. int16 → float, remove the DC mean
///  2. centered crop to `max_utterance_ms`
///  3. overlapping frames of `frame_len_ms`, hop `frame_shift_ms`
///  4. pre-emphasis, Hann window, zero-padded FFT, power spectrum
///  5. mel filterbank, natural log floored at ε
///  6. average-pool down to `max_frames` rows when longer
///  7. DCT-II, first `coeffs` cepstra
///  8. delta and delta-delta
///  9. `[c | Δ | ΔΔ]` per frame
/// 10. CMVN over the sequence
pub struct FeatureExtractor {
    frame_len: usize,
    hop: usize,
    fft_size: usize,
    pre_emphasis: f32,
    coeffs: usize,
    max_frames: usize,
    max_samples: usize,

    hann: Vec<f32>,
    mel: MelFilterBank,
    dct: DctTable,
    fft: Arc<dyn Fft<f32>>,
}

impl FeatureExtractor {
    /// Build the tables for `cfg`. Fails only on an invalid configuration.
    pub fn new(cfg: &Config) -> Result<Self> {
        cfg.validate()?;
        let sr = cfg.audio.sample_rate;
        let f = &cfg.features;
        let frame_len = f.frame_len(sr);

        let hann = if frame_len == 1 {
            vec![1.0]
        } else {
            (0..frame_len)
                .map(|n| 0.5 - 0.5 * ((2.0 * PI * n as f32) / (frame_len - 1) as f32).cos())
                .collect()
        };
        let fft = FftPlanner::<f32>::new().plan_fft_forward(f.fft_size);

        Ok(Self {
            frame_len,
            hop: f.hop_len(sr),
            fft_size: f.fft_size,
            pre_emphasis: f.pre_emphasis,
            coeffs: f.coeffs,
            max_frames: f.max_frames,
            max_samples: ms_to_samples(f.max_utterance_ms, sr).max(frame_len),
            hann,
            mel: MelFilterBank::new(sr, f.fft_size, f.mel_bands, f.mel_low_hz, f.mel_high_hz),
            dct: DctTable::new(f.mel_bands, f.coeffs),
            fft,
        })
    }

    /// Width of every produced feature vector.
    #[inline]
    pub fn dim(&self) -> usize {
        self.coeffs * 3
    }

    /// Frames `extract` would produce for `samples` of audio.
    pub fn frames_for(&self, samples: usize) -> usize {
        let samples = samples.min(self.max_samples);
        if samples < self.frame_len {
            return 0;
        }
        (1 + (samples - self.frame_len) / self.hop).min(self.max_frames)
    }

    /// Features of one utterance; empty when shorter than one frame.
    pub fn extract(&self, pcm: &[i16]) -> FeatureSequence {
        let dim = self.dim();

        // 1) float, DC of the whole input removed
        let start = pcm.len().saturating_sub(self.max_samples) / 2;
        let end = pcm.len().min(start + self.max_samples);
        if end - start < self.frame_len {
            return FeatureSequence::empty(dim);
        }
        let mut signal = pcm_to_f32(pcm);
        let mean = signal.iter().sum::<f32>() / signal.len() as f32;

        // 2) centered crop
        signal.truncate(end);
        signal.drain(..start);
        signal.iter_mut().for_each(|s| *s -= mean);

        // 3-5) framing → log-mel rows
        let log_mel = self.log_mel_frames(&signal);
        let bands = self.mel.len();

        // 6) pool
        let log_mel = pool_rows(log_mel, bands, self.max_frames);
        let rows = log_mel.len() / bands;

        // 7) cepstra
        let c = self.coeffs;
        let mut ceps = vec![0f32; rows * c];
        for (row, out) in log_mel.chunks_exact(bands).zip(ceps.chunks_exact_mut(c)) {
            self.dct.apply(row, out);
        }

        // 8-9) [c | Δ | ΔΔ]
        let d1 = KfcNormalizer::delta(&ceps, c);
        let d2 = KfcNormalizer::delta(&d1, c);
        let mut data = Vec::with_capacity(rows * dim);
        for t in 0..rows {
            let r = t * c..(t + 1) * c;
            data.extend_from_slice(&ceps[r.clone()]);
            data.extend_from_slice(&d1[r.clone()]);
            data.extend_from_slice(&d2[r]);
        }

        // 10) CMVN
        KfcNormalizer::cmvn(&mut data, dim);
        trace!("extracted {rows} feature frames from {} samples", pcm.len());

        FeatureSequence { data, dim }
    }

    fn log_mel_frames(&self, signal: &[f32]) -> Vec<f32> {
        let frames = 1 + (signal.len() - self.frame_len) / self.hop;
        let bands = self.mel.len();
        let bins = self.fft_size / 2 + 1;

        let mut buf = vec![Complex32::ZERO; self.fft_size];
        let mut scratch = vec![Complex32::ZERO; self.fft.get_inplace_scratch_len()];
        let mut power = vec![0f32; bins];
        let mut out = vec![0f32; frames * bands];

        for (t, row) in out.chunks_exact_mut(bands).enumerate() {
            let frame = &signal[t * self.hop..t * self.hop + self.frame_len];

            buf.fill(Complex32::ZERO);
            let mut prev = 0.0;
            for (n, (dst, &x)) in buf.iter_mut().zip(frame).enumerate() {
                let emph = if n == 0 { x } else { x - self.pre_emphasis * prev };
                prev = x;
                dst.re = emph * self.hann[n];
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);

            for (p, c) in power.iter_mut().zip(&buf) {
                *p = c.re * c.re + c.im * c.im;
            }
            self.mel.apply(&power, row);
            for e in row.iter_mut() {
                *e = e.max(LOG_EPSILON).ln();
            }
        }
        out
    }
}

/// Average `rows × width` down to at most `cap` rows over evenly spaced bins.
fn pool_rows(data: Vec<f32>, width: usize, cap: usize) -> Vec<f32> {
    let rows = data.len() / width;
    if rows <= cap {
        return data;
    }
    let mut out = vec![0f32; cap * width];
    for (b, dst) in out.chunks_exact_mut(width).enumerate() {
        let lo = b * rows / cap;
        let hi = ((b + 1) * rows / cap).max(lo + 1);
        for src in data[lo * width..hi * width].chunks_exact(width) {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        let k = 1.0 / (hi - lo) as f32;
        dst.iter_mut().for_each(|d| *d *= k);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, secs: f32, amp: f32) -> Vec<i16> {
        let n = (16_000.0 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                (amp * 32_767.0 * (2.0 * PI * freq * t).sin()) as i16
            })
            .collect()
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&Config::default()).unwrap()
    }

    #[test]
    fn shorter_than_one_frame_is_empty() {
        let ex = extractor();
        assert!(ex.extract(&[100i16; 399]).is_empty());
        assert!(ex.extract(&[]).is_empty());
        assert_eq!(ex.extract(&[100i16; 400]).len(), 1);
    }

    #[test]
    fn frame_count_follows_hop() {
        let ex = extractor();
        let seq = ex.extract(&tone(440.0, 0.5, 0.3));
        assert_eq!(seq.dim(), 39);
        assert_eq!(seq.len(), 1 + (8_000 - 400) / 160);
        assert_eq!(seq.len(), ex.frames_for(8_000));
    }

    #[test]
    fn long_input_is_cropped_and_pooled() {
        let ex = extractor();
        let seq = ex.extract(&tone(300.0, 3.5, 0.3));
        assert_eq!(seq.len(), 120);
        assert_eq!(ex.frames_for(56_000), 120);
    }

    #[test]
    fn dc_is_measured_before_the_crop() {
        let ex = extractor();
        // amplitude-modulated so frames differ and CMVN keeps the change
        let clean: Vec<i16> = (0..48_000)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                let env = 0.2 + 0.15 * (2.0 * PI * 3.0 * t).sin();
                (env * 32_767.0 * (2.0 * PI * 440.0 * t).sin()) as i16
            })
            .collect();
        let mut offset = clean.clone();
        // the first 0.5 s falls outside the centered 2 s window
        for s in &mut offset[..8_000] {
            *s = s.saturating_add(12_000);
        }
        let a = ex.extract(&clean);
        let b = ex.extract(&offset);
        assert_eq!(a.len(), b.len());
        let moved = a
            .as_flat()
            .iter()
            .zip(b.as_flat())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max);
        assert!(moved > 1e-3, "max change {moved}");
    }

    #[test]
    fn output_is_finite_even_for_silence() {
        let seq = extractor().extract(&[0i16; 4_000]);
        assert!(!seq.is_empty());
        assert!(seq.as_flat().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn pooling_averages_evenly() {
        let data: Vec<f32> = (0..6).map(|v| v as f32).collect();
        assert_eq!(pool_rows(data, 1, 3), vec![0.5, 2.5, 4.5]);
    }

    #[test]
    fn from_flat_rejects_ragged_buffers() {
        assert!(FeatureSequence::from_flat(vec![0.0; 78], 39).is_some());
        assert!(FeatureSequence::from_flat(vec![0.0; 40], 39).is_none());
        assert!(FeatureSequence::from_flat(vec![], 0).is_none());
    }
}
