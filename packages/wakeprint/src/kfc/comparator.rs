//! DTW-based similarity between two feature sequences.

use core::cmp::min;

use super::{FeatureSequence, dtw::Dtw};

/// Dynamic-time-warping **KFC comparator** backed by cosine distance.
///
/// The DP matrix is owned and reused, so repeated comparisons against the
/// same templates allocate only when a longer pair comes along. Inputs are
/// expected to be L2-normalised per frame already; see
/// [`FeatureSequence::l2_normalized`].
#[derive(Debug)]
pub struct KfcComparator {
    band: usize,
    dtw: Dtw,
}

impl Clone for KfcComparator {
    fn clone(&self) -> Self {
        Self::new(self.band)
    }
}

impl KfcComparator {
    /// `band` is the minimum Sakoe-Chiba half-width in frames.
    pub fn new(band: usize) -> Self {
        Self {
            band,
            dtw: Dtw::new(),
        }
    }

    /// Similarity in `[0, 1]`: `1 - (cost / (n + m)) / 2`.
    ///
    /// Local cost is `1 - cos`, so the normalised path cost lies in
    /// `[0, 2]`. Returns 0 when either side is empty.
    pub fn similarity(&mut self, a: &FeatureSequence, b: &FeatureSequence) -> f32 {
        let (n, m) = (a.len(), b.len());
        let cost = self
            .dtw
            .align(n, m, self.band, |i, j| Self::distance(a.frame(i), b.frame(j)));
        if !cost.is_finite() {
            return 0.0;
        }
        let norm = cost / (n + m) as f32;
        (1.0 - norm / 2.0).clamp(0.0, 1.0)
    }

    /// Lowest similarity over all pairs in `seqs`; `None` below two.
    pub fn min_pairwise(&mut self, seqs: &[FeatureSequence]) -> Option<f32> {
        if seqs.len() < 2 {
            return None;
        }
        let mut min = f32::INFINITY;
        for (i, a) in seqs.iter().enumerate() {
            for b in &seqs[i + 1..] {
                min = min.min(self.similarity(a, b));
            }
        }
        Some(min)
    }

    /// DTW local distance = 1 - cosine_similarity.
    #[inline]
    pub fn distance(ax: &[f32], bx: &[f32]) -> f32 {
        1.0 - cosine_similarity(ax, bx)
    }
}

/// One-off [`KfcComparator::similarity`].
pub fn dtw_similarity(a: &FeatureSequence, b: &FeatureSequence, band: usize) -> f32 {
    KfcComparator::new(band).similarity(a, b)
}

/// Cosine similarity ∈ \[-1, 1\] (truncated to min length when slices differ).
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = min(a.len(), b.len());
    if n == 0 {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for i in 0..n {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        (dot / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn random_seq(rng: &mut StdRng, frames: usize, dim: usize) -> FeatureSequence {
        let data = (0..frames * dim).map(|_| rng.random_range(-1.0..1.0)).collect();
        FeatureSequence::from_flat(data, dim).unwrap().l2_normalized()
    }

    #[test]
    fn cosine_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let a: Vec<f32> = (0..39).map(|_| rng.random_range(-5.0..5.0)).collect();
            let b: Vec<f32> = (0..39).map(|_| rng.random_range(-5.0..5.0)).collect();
            let c = cosine_similarity(&a, &b);
            assert!((-1.0..=1.0).contains(&c));
        }
        assert_eq!(cosine_similarity(&[0.0; 3], &[1.0; 3]), 0.0);
        assert_eq!(cosine_similarity(&[2.0, 0.0], &[-3.0, 0.0]), -1.0);
    }

    #[test]
    fn similarity_is_bounded_and_symmetric() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cmp = KfcComparator::new(20);
        for (n, m) in [(30, 30), (12, 50), (80, 41)] {
            let a = random_seq(&mut rng, n, 39);
            let b = random_seq(&mut rng, m, 39);
            let ab = cmp.similarity(&a, &b);
            let ba = cmp.similarity(&b, &a);
            assert!((0.0..=1.0).contains(&ab));
            assert_abs_diff_eq!(ab, ba, epsilon = 1e-6);
        }
    }

    #[test]
    fn self_similarity_is_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_seq(&mut rng, 64, 39);
        assert_abs_diff_eq!(dtw_similarity(&a, &a, 20), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn min_pairwise_needs_two() {
        let mut rng = StdRng::seed_from_u64(9);
        let a = random_seq(&mut rng, 20, 39);
        let b = random_seq(&mut rng, 25, 39);
        let mut cmp = KfcComparator::new(20);
        assert_eq!(cmp.min_pairwise(std::slice::from_ref(&a)), None);
        let ab = cmp.similarity(&a, &b);
        let min = cmp.min_pairwise(&[a.clone(), a, b]).unwrap();
        assert_abs_diff_eq!(min, ab, epsilon = 1e-6);
    }

    #[test]
    fn empty_side_scores_zero() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = random_seq(&mut rng, 10, 39);
        assert_eq!(dtw_similarity(&a, &FeatureSequence::empty(39), 20), 0.0);
    }
}
