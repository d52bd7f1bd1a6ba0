//! Banded Dynamic-Time-Warping over a flattened cost matrix.
//!
//!  * The `(n+1) × (m+1)` accumulator lives in one `Vec<f32>` that is
//!    reused between calls and only grows.
//!  * Row 0 and column 0 are the +∞ border; `dp[0][0] = 0`.
//!  * The Sakoe-Chiba half-width is widened to `|n - m|` so the end cell
//!    is always reachable.

use std::cmp;

/// 2-D index helper for a flattened `(rows × cols)` buffer.
#[inline(always)]
fn idx(row: usize, col: usize, cols: usize) -> usize {
    row * cols + col
}

#[derive(Debug, Default)]
pub struct Dtw {
    cost: Vec<f32>,
}

impl Dtw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated alignment cost of an `n × m` problem.
    ///
    /// `dist(i, j)` is the local cost between frame `i` of the first
    /// sequence and frame `j` of the second (both 0-based). Returns +∞
    /// when either side is empty.
    pub fn align<F>(&mut self, n: usize, m: usize, band: usize, mut dist: F) -> f32
    where
        F: FnMut(usize, usize) -> f32,
    {
        if n == 0 || m == 0 {
            return f32::INFINITY;
        }
        let cols = m + 1;
        let needed = (n + 1) * cols;
        if self.cost.len() < needed {
            self.cost.resize(needed, f32::INFINITY);
        }
        let dp = &mut self.cost[..needed];
        dp.fill(f32::INFINITY);
        dp[0] = 0.0;

        let w = cmp::max(band, n.abs_diff(m));

        for i in 1..=n {
            let start = cmp::max(1, i.saturating_sub(w));
            let end = cmp::min(m, i + w);
            for j in start..=end {
                // min(↑, ←, ↖)
                let up = dp[idx(i - 1, j, cols)];
                let left = dp[idx(i, j - 1, cols)];
                let diag = dp[idx(i - 1, j - 1, cols)];
                dp[idx(i, j, cols)] = dist(i - 1, j - 1) + up.min(left).min(diag);
            }
        }
        dp[idx(n, m, cols)]
    }
}

/* ───────────────────────────── tests ──────────────────────────────── */
