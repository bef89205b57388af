use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The four classes the remote model can emit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum ClassLabel {
    #[serde(rename = "Cassava Bacterial Blight (CBB)")]
    #[strum(to_string = "Cassava Bacterial Blight (CBB)")]
    BacterialBlight,
    #[serde(rename = "Cassava Brown Streak Disease (CBSD)")]
    #[strum(to_string = "Cassava Brown Streak Disease (CBSD)")]
    BrownStreak,
    #[serde(rename = "Cassava Mosaic Disease (CMD)")]
    #[strum(to_string = "Cassava Mosaic Disease (CMD)")]
    Mosaic,
    #[serde(rename = "Healthy Cassava Leaf")]
    #[strum(to_string = "Healthy Cassava Leaf")]
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Severity {
    High,
    Medium,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseaseInfo {
    pub severity: Severity,
    pub description: &'static str,
    pub treatment: &'static str,
}

impl ClassLabel {
    /// Canonical model output order.
    pub const ALL: [ClassLabel; 4] = [
        ClassLabel::BacterialBlight,
        ClassLabel::BrownStreak,
        ClassLabel::Mosaic,
        ClassLabel::Healthy,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ClassLabel::Healthy)
    }

    pub fn info(&self) -> DiseaseInfo {
        match self {
            ClassLabel::BacterialBlight => DiseaseInfo {
                severity: Severity::High,
                description: "Bacterial infection causing angular leaf spots and wilting",
                treatment: "Remove infected plants, use copper-based treatments",
            },
            ClassLabel::BrownStreak => DiseaseInfo {
                severity: Severity::High,
                description: "Viral disease causing brown streaks and root rot",
                treatment: "Use resistant varieties, control whitefly vectors",
            },
            ClassLabel::Mosaic => DiseaseInfo {
                severity: Severity::Medium,
                description: "Viral infection creating mosaic patterns on leaves",
                treatment: "Plant resistant varieties, remove infected plants",
            },
            ClassLabel::Healthy => DiseaseInfo {
                severity: Severity::None,
                description: "Healthy leaf with no disease symptoms",
                treatment: "Continue monitoring and good practices",
            },
        }
    }
}
