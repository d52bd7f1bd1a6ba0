use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    Result, WakeprintError,
    constants::TEMPLATE_FILE_VERSION,
    kfc::{FeatureSequence, KfcComparator},
};

/// One enrolled utterance: a flat feature matrix whose row width is the
/// owning set's `feature_dim`.
pub type Template = Vec<f32>;

/// The user's enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub version: u8,
    pub feature_dim: usize,
    pub templates: Vec<Template>,
}

impl TemplateSet {
    pub fn new(feature_dim: usize) -> Self {
        Self {
            version: TEMPLATE_FILE_VERSION,
            feature_dim,
            templates: Vec::new(),
        }
    }

    /// Add one utterance; its width must match the set.
    pub fn push(&mut self, seq: FeatureSequence) -> Result<()> {
        if seq.dim() != self.feature_dim {
            return Err(WakeprintError::Templates(format!(
                "feature width {} does not match set width {}",
                seq.dim(),
                self.feature_dim
            )));
        }
        if seq.is_empty() {
            return Err(WakeprintError::Templates("empty template".into()));
        }
        self.templates.push(seq.into_flat());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates that are a whole, non-zero number of `dim`-wide frames,
    /// each frame scaled to unit length for DTW scoring.
    pub fn usable(&self, dim: usize) -> impl Iterator<Item = FeatureSequence> + '_ {
        self.templates
            .iter()
            .filter_map(move |t| FeatureSequence::from_flat(t.clone(), dim))
            .filter(|t| !t.is_empty())
            .map(|t| t.l2_normalized())
    }

    /// Minimum pairwise DTW similarity among usable templates.
    ///
    /// A low value means the enrollment samples disagree with each other.
    /// `None` with fewer than two usable templates.
    pub fn consistency(&self, band: usize) -> Option<f32> {
        let seqs: Vec<FeatureSequence> = self.usable(self.feature_dim).collect();
        KfcComparator::new(band).min_pairwise(&seqs)
    }
}

/// Enrollment shared between the listener and whoever re-enrolls.
///
/// Readers take an `Arc` snapshot per match attempt and never hold the
/// lock while scoring.
#[derive(Debug, Clone)]
pub struct SharedTemplates {
    inner: Arc<RwLock<Arc<TemplateSet>>>,
}

impl SharedTemplates {
    pub fn new(set: TemplateSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(set))),
        }
    }

    pub fn snapshot(&self) -> Arc<TemplateSet> {
        self.inner.read().clone()
    }

    /// Swap in a new enrollment; returns the previous one.
    pub fn replace(&self, set: TemplateSet) -> Arc<TemplateSet> {
        std::mem::replace(&mut *self.inner.write(), Arc::new(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(frames: usize, dim: usize, phase: f32) -> FeatureSequence {
        let data = (0..frames * dim)
            .map(|i| ((i as f32) * 0.37 + phase).sin())
            .collect();
        FeatureSequence::from_flat(data, dim).unwrap()
    }

    #[test]
    fn push_checks_width() {
        let mut set = TemplateSet::new(6);
        set.push(seq(4, 6, 0.0)).unwrap();
        assert!(set.push(seq(4, 3, 0.0)).is_err());
        assert!(set.push(FeatureSequence::empty(6)).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ragged_templates_are_not_usable() {
        let mut set = TemplateSet::new(6);
        set.push(seq(4, 6, 0.0)).unwrap();
        set.templates.push(vec![0.0; 7]);
        assert_eq!(set.usable(6).count(), 1);
        assert_eq!(set.consistency(20), None);
    }

    #[test]
    fn identical_templates_are_fully_consistent() {
        let mut set = TemplateSet::new(6);
        set.push(seq(10, 6, 0.0)).unwrap();
        set.push(seq(10, 6, 0.0)).unwrap();
        let c = set.consistency(20).unwrap();
        approx::assert_abs_diff_eq!(c, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn snapshot_survives_replace() {
        let shared = SharedTemplates::new(TemplateSet::new(6));
        let before = shared.snapshot();
        let mut next = TemplateSet::new(6);
        next.push(seq(3, 6, 1.0)).unwrap();
        shared.replace(next);
        assert!(before.is_empty());
        assert_eq!(shared.snapshot().len(), 1);
    }
}
