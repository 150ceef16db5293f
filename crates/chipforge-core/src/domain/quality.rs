//! Quality report types.

use serde::{Deserialize, Serialize};

use super::analysis::Dimension;
use super::architecture::SnapshotId;

/// Predicted failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    CapabilityGap,
    CongestionRisk,
    TimingRisk,
    ThermalRisk,
    YieldRisk,
}

impl FailureCategory {
    /// Category predicted when `dimension` scores below the risk threshold.
    pub fn for_dimension(dimension: Dimension) -> Self {
        match dimension {
            Dimension::Component => Self::CapabilityGap,
            Dimension::Connectivity => Self::CongestionRisk,
            Dimension::Performance => Self::TimingRisk,
            Dimension::Power => Self::ThermalRisk,
            Dimension::Area => Self::YieldRisk,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CapabilityGap => "capability-gap",
            Self::CongestionRisk => "congestion-risk",
            Self::TimingRisk => "timing-risk",
            Self::ThermalRisk => "thermal-risk",
            Self::YieldRisk => "yield-risk",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicted failure mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    pub category: FailureCategory,
    /// Dimension whose low score triggered this mode.
    pub dimension: Dimension,
    /// Severity in [0, 1].
    pub severity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Reliability and risk assessment of one analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub snapshot_id: SnapshotId,
    pub reliability: f64,
    pub defect_probability: f64,
    pub redundancy_bonus: f64,
    pub failure_modes: Vec<FailureMode>,
    pub verdict: Verdict,
    /// Why the verdict is `Fail`; empty on pass.
    #[serde(default)]
    pub block_reasons: Vec<String>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn has_category(&self, category: FailureCategory) -> bool {
        self.failure_modes.iter().any(|m| m.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureCategory::ThermalRisk).expect("serialize");
        assert_eq!(json, "\"thermal-risk\"");
        assert_eq!(
            FailureCategory::for_dimension(Dimension::Connectivity).as_str(),
            "congestion-risk"
        );
    }
}
