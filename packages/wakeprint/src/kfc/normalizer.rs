//! KFC frame normalisation utilities.
//!
//! All helpers work on a row-major matrix stored flat: `frames.len()` is
//! a multiple of `dim` and row `t` is `frames[t * dim..(t + 1) * dim]`.

use crate::constants::LOG_EPSILON;

/// Stateless helper for per-sequence normalisation.
pub struct KfcNormalizer;

impl KfcNormalizer {
    /// Cepstral mean and variance normalisation, in place.
    ///
    /// Every column ends up with zero mean and, unless it was constant,
    /// unit variance. Variances are floored at [`LOG_EPSILON`] so a flat
    /// column stays finite (it becomes all zeros).
    pub fn cmvn(frames: &mut [f32], dim: usize) {
        if dim == 0 || frames.len() < dim {
            return;
        }
        let rows = frames.len() / dim;
        let n_inv = 1.0 / rows as f32;

        let mut mean = vec![0f32; dim];
        for row in frames.chunks_exact(dim) {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m *= n_inv;
        }

        let mut var = vec![0f32; dim];
        for row in frames.chunks_exact(dim) {
            for ((s, &v), &m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v - m;
                *s += d * d;
            }
        }
        let inv_std: Vec<f32> = var
            .iter()
            .map(|&s| 1.0 / (s * n_inv).max(LOG_EPSILON).sqrt())
            .collect();

        for row in frames.chunks_exact_mut(dim) {
            for ((v, &m), &k) in row.iter_mut().zip(&mean).zip(&inv_std) {
                *v = (*v - m) * k;
            }
        }
    }

    /// Scale each row to unit L2 norm. All-zero rows are left untouched.
    pub fn l2_rows(frames: &mut [f32], dim: usize) {
        if dim == 0 {
            return;
        }
        for row in frames.chunks_exact_mut(dim) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > LOG_EPSILON {
                let k = 1.0 / norm;
                row.iter_mut().for_each(|v| *v *= k);
            }
        }
    }

    /// Symmetric first difference `(x[t+1] - x[t-1]) / 2`, reusing the
    /// edge row past either end of the sequence.
    pub fn delta(frames: &[f32], dim: usize) -> Vec<f32> {
        if dim == 0 {
            return Vec::new();
        }
        let rows = frames.len() / dim;
        let mut out = vec![0f32; rows * dim];
        for t in 0..rows {
            let prev = t.saturating_sub(1);
            let next = (t + 1).min(rows - 1);
            let p = &frames[prev * dim..(prev + 1) * dim];
            let n = &frames[next * dim..(next + 1) * dim];
            for (k, o) in out[t * dim..(t + 1) * dim].iter_mut().enumerate() {
                *o = (n[k] - p[k]) * 0.5;
            }
        }
        out
    }
}

/* --------------------------------------------------------------------- */
/*  Unit-tests                                                           */
