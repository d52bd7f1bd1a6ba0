//! Level-based fallback classifier.
//!
//! Maps the RMS level of a window (in dBFS) onto a logistic curve. It has no
//! recurrent state and needs no context, so it works anywhere the neural
//! model is unavailable.

use crate::{ClassifierError, SpeechClassifier};

/// Energy-only speech classifier.
#[derive(Debug, Clone, Copy)]
pub struct EnergyClassifier {
    /// Level (dBFS) that maps to probability 0.5.
    center_db: f32,
    /// dB per logistic unit; smaller is steeper.
    slope_db: f32,
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self {
            center_db: -42.0,
            slope_db: 3.0,
        }
    }
}

impl EnergyClassifier {
    pub fn new(center_db: f32, slope_db: f32) -> Self {
        Self {
            center_db,
            slope_db: slope_db.max(f32::EPSILON),
        }
    }

    /// RMS level of `window` in dBFS, floored at -120 dB.
    pub fn level_db(window: &[f32]) -> f32 {
        if window.is_empty() {
            return -120.0;
        }
        let mean_sq = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
        (10.0 * mean_sq.max(1e-12).log10()).max(-120.0)
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn context_size(&self) -> usize {
        0
    }

    fn speech_probability(&mut self, window: &[f32]) -> Result<f32, ClassifierError> {
        let db = Self::level_db(window);
        let p = 1.0 / (1.0 + (-(db - self.center_db) / self.slope_db).exp());
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ClassifierError::NonFinite)
        }
    }

    fn reset(&mut self) {}
}
