//! Template scoring and the wake decision.
//!
//! Gates run in a fixed order and the first failure ends the attempt:
//!
//! 1. at least one template
//! 2. segment RMS above `max(min_rms, noise_floor + rms_noise_margin)`
//! 3. a non-empty, well-formed live feature sequence
//! 4. a set of the current feature width with at least one template whose
//!    length is a whole number of frames
//! 5. live/template duration ratio within range
//!
//! Only then is DTW run, against every usable template, and the scores go
//! through [`decide`].

use std::fmt;

use tracing::{debug, instrument, warn};

use crate::{
    Config, Result,
    audio::rms,
    config::MatcherConfig,
    kfc::{FeatureExtractor, FeatureSequence, KfcComparator},
    templates::TemplateSet,
};

/// An accepted segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeDecision {
    /// Best template similarity.
    pub confidence: f32,
    /// Templates at or above the threshold.
    pub hits: usize,
    /// Threshold the scores were held against.
    pub threshold: f32,
}

/// Why a segment produced no decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NoTemplates,
    EnergyTooLow { rms: f32, required: f32 },
    EmptyFeatures,
    /// No stored template fits the current feature layout; re-enroll.
    IncompatibleTemplates,
    DurationOutOfRange { ratio: f32 },
    BelowThreshold { best: f32, hits: usize, threshold: f32 },
    /// One template agreed, the rest were far behind.
    OutlierSpike { best: f32, second: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTemplates => write!(f, "no templates enrolled"),
            Self::EnergyTooLow { rms, required } => {
                write!(f, "segment too quiet (rms {rms:.4} < {required:.4})")
            }
            Self::EmptyFeatures => write!(f, "no features extracted"),
            Self::IncompatibleTemplates => {
                write!(f, "templates incompatible with feature layout; re-enrollment needed")
            }
            Self::DurationOutOfRange { ratio } => {
                write!(f, "duration ratio {ratio:.2} out of range")
            }
            Self::BelowThreshold {
                best,
                hits,
                threshold,
            } => write!(f, "best {best:.3} with {hits} hit(s) at threshold {threshold:.3}"),
            Self::OutlierSpike { best, second } => {
                write!(f, "lone spike: best {best:.3}, runner-up {second:.3}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Accepted(WakeDecision),
    Rejected(Rejection),
}

impl MatchOutcome {
    pub fn decision(&self) -> Option<WakeDecision> {
        match self {
            Self::Accepted(d) => Some(*d),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Acceptance bar adapted to how consistent the enrollment is.
///
/// `max(floor, min(threshold, intra_min - margin))`; the static threshold
/// when there is no intra-template figure.
pub fn dynamic_threshold(intra_min: Option<f32>, cfg: &MatcherConfig) -> f32 {
    match intra_min {
        Some(intra) => (intra - cfg.dynamic_threshold_margin)
            .min(cfg.similarity_threshold)
            .max(cfg.min_dynamic_threshold),
        None => cfg.similarity_threshold,
    }
}

/// Final decision over per-template similarities.
///
/// Accepts when `hits >= min(required_matches, templates)` and either
/// there is a single template, two or more templates hit, or the gap
/// between best and runner-up is within `max_best_second_gap`.
pub fn decide(scores: &[f32], threshold: f32, cfg: &MatcherConfig) -> MatchOutcome {
    if scores.is_empty() {
        return MatchOutcome::Rejected(Rejection::NoTemplates);
    }
    let (mut best, mut second) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for &s in scores {
        if s > best {
            second = best;
            best = s;
        } else if s > second {
            second = s;
        }
    }
    let hits = scores.iter().filter(|&&s| s >= threshold).count();
    let required = cfg.required_matches.min(scores.len());

    if hits < required || hits == 0 {
        return MatchOutcome::Rejected(Rejection::BelowThreshold {
            best,
            hits,
            threshold,
        });
    }
    if scores.len() >= 2 && hits < 2 && best - second > cfg.max_best_second_gap {
        return MatchOutcome::Rejected(Rejection::OutlierSpike { best, second });
    }
    MatchOutcome::Accepted(WakeDecision {
        confidence: best,
        hits,
        threshold,
    })
}

/// Scores closed segments against enrolled templates.
pub struct TemplateMatcher {
    cfg: MatcherConfig,
    extractor: FeatureExtractor,
    comparator: KfcComparator,
}

impl TemplateMatcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            cfg: cfg.matcher.clone(),
            extractor: FeatureExtractor::new(cfg)?,
            comparator: KfcComparator::new(cfg.matcher.dtw_band),
        })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    /// Full gate chain over a closed segment.
    #[instrument(level = "debug", skip(self, pcm, templates), fields(samples = pcm.len(), templates = templates.len()))]
    pub fn match_segment(
        &mut self,
        pcm: &[i16],
        speech_ms: f32,
        noise_floor: f32,
        templates: &TemplateSet,
    ) -> MatchOutcome {
        if templates.is_empty() {
            return MatchOutcome::Rejected(Rejection::NoTemplates);
        }

        let level = rms(pcm);
        let required = self.cfg.min_rms.max(noise_floor + self.cfg.rms_noise_margin);
        if level <= required {
            debug!("energy gate: {speech_ms:.0} ms at rms {level:.4} <= {required:.4}");
            return MatchOutcome::Rejected(Rejection::EnergyTooLow {
                rms: level,
                required,
            });
        }

        let live = self.extractor.extract(pcm);
        debug!("{speech_ms:.0} ms of speech, {} feature frames", live.len());
        self.match_features(&live, templates)
    }

    /// Gates 3-5, scoring and decision for already extracted features.
    pub fn match_features(&mut self, live: &FeatureSequence, templates: &TemplateSet) -> MatchOutcome {
        if templates.is_empty() {
            return MatchOutcome::Rejected(Rejection::NoTemplates);
        }
        let dim = self.extractor.dim();
        if live.is_empty() || live.dim() != dim {
            return MatchOutcome::Rejected(Rejection::EmptyFeatures);
        }

        let usable: Vec<FeatureSequence> = if templates.feature_dim == dim {
            templates.usable(dim).collect()
        } else {
            Vec::new()
        };
        if usable.is_empty() {
            warn!(
                "none of {} template(s) fit {dim}-wide features; re-enrollment needed",
                templates.len()
            );
            return MatchOutcome::Rejected(Rejection::IncompatibleTemplates);
        }

        let mean_frames =
            usable.iter().map(|t| t.len() as f32).sum::<f32>() / usable.len() as f32;
        let ratio = live.len() as f32 / mean_frames;
        if ratio < self.cfg.min_duration_ratio || ratio > self.cfg.max_duration_ratio {
            debug!("duration gate: ratio {ratio:.2}");
            return MatchOutcome::Rejected(Rejection::DurationOutOfRange { ratio });
        }

        let intra = self.comparator.min_pairwise(&usable);
        let threshold = dynamic_threshold(intra, &self.cfg);

        let live = live.l2_normalized();
        let scores: Vec<f32> = usable
            .iter()
            .map(|t| self.comparator.similarity(&live, t))
            .collect();
        debug!("scores {scores:?}, threshold {threshold:.3}, intra {intra:?}");

        decide(&scores, threshold, &self.cfg)
    }
}
