use serde::{Deserialize, Serialize};

/// How sure the classifier must be before a frame counts as speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VadSeverity {
    /// Never reports speech; the classifier is not invoked.
    Off,
    #[default]
    Normal,
    Aggressive,
    VeryAggressive,
}

impl VadSeverity {
    /// Probability cutoff for this tier, `None` for [`VadSeverity::Off`].
    pub const fn cutoff(self) -> Option<f32> {
        match self {
            Self::Off => None,
            Self::Normal => Some(0.50),
            Self::Aggressive => Some(0.80),
            Self::VeryAggressive => Some(0.95),
        }
    }
}

impl std::fmt::Display for VadSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Normal => "normal",
            Self::Aggressive => "aggressive",
            Self::VeryAggressive => "very_aggressive",
        })
    }
}
