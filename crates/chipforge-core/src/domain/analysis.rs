//! Analysis results and score weights.

use serde::{Deserialize, Serialize};

use super::architecture::SnapshotId;
use super::error::DesignError;

/// Engineering dimension a score is computed along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Component,
    Connectivity,
    Performance,
    Power,
    Area,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Component,
        Dimension::Connectivity,
        Dimension::Performance,
        Dimension::Power,
        Dimension::Area,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::Connectivity => "connectivity",
            Self::Performance => "performance",
            Self::Power => "power",
            Self::Area => "area",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub component: f64,
    pub connectivity: f64,
    pub performance: f64,
    pub power: f64,
    pub area: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Component => self.component,
            Dimension::Connectivity => self.connectivity,
            Dimension::Performance => self.performance,
            Dimension::Power => self.power,
            Dimension::Area => self.area,
        }
    }

    /// Dimensions ordered from lowest to highest score. Ties keep the
    /// declaration order of [`Dimension::ALL`].
    pub fn ascending(&self) -> Vec<(Dimension, f64)> {
        let mut scored: Vec<(Dimension, f64)> =
            Dimension::ALL.iter().map(|d| (*d, self.get(*d))).collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored
    }
}

/// Scores for exactly one snapshot. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub snapshot_id: SnapshotId,
    pub revision: u32,
    pub scores: DimensionScores,
    /// Weighted combination of `scores`, in [0, 1].
    pub overall: f64,
    /// Normalized fabric congestion in [0, 1].
    pub congestion: f64,
    pub effective_frequency_ghz: f64,
    pub estimated_power_w: f64,
    pub estimated_area_mm2: f64,
}

/// Weights of the overall score.
///
/// Fields are private and every construction path (including
/// deserialization) goes through [`ScoreWeights::new`], so a value of this
/// type always holds non-negative weights summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights", into = "RawWeights")]
pub struct ScoreWeights {
    performance: f64,
    power: f64,
    area: f64,
    connectivity: f64,
    component: f64,
}

const WEIGHT_TOLERANCE: f64 = 1e-9;

impl ScoreWeights {
    pub fn new(
        performance: f64,
        power: f64,
        area: f64,
        connectivity: f64,
        component: f64,
    ) -> Result<Self, DesignError> {
        let all = [performance, power, area, connectivity, component];
        let sum: f64 = all.iter().sum();
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DesignError::InvalidWeights {
                reason: "weights must be finite and non-negative".to_string(),
                sum,
            });
        }
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(DesignError::InvalidWeights {
                reason: "weights must sum to 1.0".to_string(),
                sum,
            });
        }
        Ok(Self {
            performance,
            power,
            area,
            connectivity,
            component,
        })
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Component => self.component,
            Dimension::Connectivity => self.connectivity,
            Dimension::Performance => self.performance,
            Dimension::Power => self.power,
            Dimension::Area => self.area,
        }
    }

    pub fn combine(&self, scores: &DimensionScores) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d) * scores.get(*d))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            performance: 0.25,
            power: 0.20,
            area: 0.20,
            connectivity: 0.20,
            component: 0.15,
        }
    }
}

/// Unchecked weight table as it appears in config files.
#[derive(Serialize, Deserialize)]
pub(crate) struct RawWeights {
    performance: f64,
    power: f64,
    area: f64,
    connectivity: f64,
    component: f64,
}

impl TryFrom<RawWeights> for ScoreWeights {
    type Error = DesignError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(
            raw.performance,
            raw.power,
            raw.area,
            raw.connectivity,
            raw.component,
        )
    }
}

impl From<ScoreWeights> for RawWeights {
    fn from(w: ScoreWeights) -> Self {
        Self {
            performance: w.performance,
            power: w.power,
            area: w.area,
            connectivity: w.connectivity,
            component: w.component,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoreWeights::default();
        let sum: f64 = Dimension::ALL.iter().map(|d| w.get(*d)).sum();
        assert!((sum - 1.0).abs() <= WEIGHT_TOLERANCE);
        assert!(ScoreWeights::new(0.25, 0.20, 0.20, 0.20, 0.15).is_ok());
    }

    #[test]
    fn test_weights_reject_bad_sum_and_negatives() {
        let err = ScoreWeights::new(0.5, 0.5, 0.5, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, DesignError::InvalidWeights { sum, .. } if (sum - 1.5).abs() < 1e-12));

        assert!(ScoreWeights::new(1.2, -0.2, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_weights_validated_on_deserialize() {
        let ok: ScoreWeights = serde_json::from_str(
            r#"{"performance":0.2,"power":0.2,"area":0.2,"connectivity":0.2,"component":0.2}"#,
        )
        .expect("valid weights");
        assert_eq!(ok.get(Dimension::Area), 0.2);

        let bad: Result<ScoreWeights, _> = serde_json::from_str(
            r#"{"performance":0.9,"power":0.2,"area":0.2,"connectivity":0.2,"component":0.2}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_ascending_orders_lowest_first() {
        let scores = DimensionScores {
            component: 0.9,
            connectivity: 0.4,
            performance: 1.0,
            power: 0.0,
            area: 0.4,
        };
        let order: Vec<Dimension> = scores.ascending().into_iter().map(|(d, _)| d).collect();
        assert_eq!(
            order,
            vec![
                Dimension::Power,
                Dimension::Connectivity,
                Dimension::Area,
                Dimension::Component,
                Dimension::Performance
            ]
        );
    }

    #[test]
    fn test_combine_applies_weights() {
        let scores = DimensionScores {
            component: 1.0,
            connectivity: 1.0,
            performance: 1.0,
            power: 0.0,
            area: 1.0,
        };
        let overall = ScoreWeights::default().combine(&scores);
        assert!((overall - 0.8).abs() < 1e-12);
    }
}
