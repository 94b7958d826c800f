//! Confidence fusion policies.

use serde::{Deserialize, Serialize};

/// How the confidence of a correlated sighting is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FusionPolicy {
    /// The stronger of the two pieces of evidence.
    Max,
    /// Visual confidence only; audio is stored as corroboration.
    #[serde(alias = "visual-only")]
    #[value(alias = "visual-only")]
    Visual,
    /// Arithmetic mean of visual and audio confidence.
    Mean,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        crate::constants::DEFAULT_FUSION_POLICY
    }
}

impl FusionPolicy {
    /// Combine visual and audio confidence into one value.
    pub fn fuse(self, visual: f32, audio: f32) -> f32 {
        match self {
            Self::Max => visual.max(audio),
            Self::Visual => visual,
            Self::Mean => f32::midpoint(visual, audio),
        }
    }
}

impl std::fmt::Display for FusionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::Visual => write!(f, "visual"),
            Self::Mean => write!(f, "mean"),
        }
    }
}

impl std::str::FromStr for FusionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(Self::Max),
            "visual" | "visual-only" => Ok(Self::Visual),
            "mean" | "average" => Ok(Self::Mean),
            other => Err(format!("unknown fusion policy: {other}")),
        }
    }
}
