//! Config-derived tables: triangular mel filterbank and DCT-II basis.
//!
//! Both depend only on the feature configuration, never on audio, so
//! they are built once per extractor.

use std::f32::consts::PI;

/// Triangular filters over the power spectrum, stored sparsely.
#[derive(Debug, Clone)]
pub(crate) struct MelFilterBank {
    /// `(first_bin, weights)` per band.
    bands: Vec<(usize, Vec<f32>)>,
}

impl MelFilterBank {
    /// `bands` triangles with centers evenly spaced on the mel scale
    /// between `low_hz` and `high_hz`, over `fft_size / 2 + 1` bins.
    pub fn new(sample_rate: u32, fft_size: usize, bands: usize, low_hz: f32, high_hz: f32) -> Self {
        let bins = fft_size / 2 + 1;
        let bin_hz = sample_rate as f32 / fft_size as f32;
        let (mel_lo, mel_hi) = (freq_to_mel(low_hz), freq_to_mel(high_hz));
        let step = (mel_hi - mel_lo) / (bands + 1) as f32;
        let edges: Vec<f32> = (0..bands + 2)
            .map(|i| mel_to_freq(mel_lo + i as f32 * step))
            .collect();

        let bands = (0..bands)
            .map(|b| {
                let (f_left, f_center, f_right) = (edges[b], edges[b + 1], edges[b + 2]);
                let first = ((f_left / bin_hz).ceil() as usize).min(bins);
                let last = ((f_right / bin_hz).floor() as usize).min(bins - 1);
                let weights = (first..=last)
                    .map(|bin| {
                        let freq = bin as f32 * bin_hz;
                        if freq <= f_center {
                            (freq - f_left) / (f_center - f_left)
                        } else {
                            (f_right - freq) / (f_right - f_center)
                        }
                        .max(0.0)
                    })
                    .collect();
                (first, weights)
            })
            .collect();
        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Band energies of one power spectrum, written into `out`.
    pub fn apply(&self, power: &[f32], out: &mut [f32]) {
        for ((first, weights), o) in self.bands.iter().zip(out.iter_mut()) {
            *o = weights
                .iter()
                .zip(power.iter().skip(*first))
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

/// Orthonormal DCT-II basis, `coeffs` rows of `inputs` columns.
#[derive(Debug, Clone)]
pub(crate) struct DctTable {
    inputs: usize,
    basis: Vec<f32>,
}

impl DctTable {
    pub fn new(inputs: usize, coeffs: usize) -> Self {
        let n = inputs as f32;
        let mut basis = Vec::with_capacity(inputs * coeffs);
        for k in 0..coeffs {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            basis.extend(
                (0..inputs).map(|m| scale * (PI / n * (m as f32 + 0.5) * k as f32).cos()),
            );
        }
        Self { inputs, basis }
    }

    /// Cepstra of one row of log-mel energies, written into `out`.
    pub fn apply(&self, log_mel: &[f32], out: &mut [f32]) {
        for (row, o) in self.basis.chunks_exact(self.inputs).zip(out.iter_mut()) {
            *o = row.iter().zip(log_mel).map(|(b, e)| b * e).sum();
        }
    }
}

#[inline]
fn freq_to_mel(f: f32) -> f32 {
    1127.0 * (1.0 + f / 700.0).ln()
}

#[inline]
fn mel_to_freq(m: f32) -> f32 {
    700.0 * ((m / 1127.0).exp() - 1.0)
}
