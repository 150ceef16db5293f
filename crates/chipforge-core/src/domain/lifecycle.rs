//! Lifecycle stages, stage entries and history.

use chipforge_state::StoredEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisResult;
use super::architecture::ArchitectureSnapshot;
use super::error::{DesignError, Result};
use super::quality::QualityReport;
use super::requirements::Requirements;

/// Stage names of the standard plan.
pub mod stage {
    pub const REGISTERED: &str = "REGISTERED";
    pub const DESIGN: &str = "DESIGN";
    pub const VERIFICATION: &str = "VERIFICATION";
    pub const FABRICATION: &str = "FABRICATION";
    pub const DEPLOYMENT: &str = "DEPLOYMENT";
    pub const RETIRED: &str = "RETIRED";
}

/// Ordered list of lifecycle stages. The first stage is where chips are
/// registered; transitions must move strictly forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StagePlan {
    stages: Vec<String>,
}

impl StagePlan {
    pub fn standard() -> Self {
        Self {
            stages: [
                stage::REGISTERED,
                stage::DESIGN,
                stage::VERIFICATION,
                stage::FABRICATION,
                stage::DEPLOYMENT,
                stage::RETIRED,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    /// Build a plan from an ordered list; rejects empty, blank and
    /// duplicate stage names.
    pub fn new(stages: Vec<String>) -> Result<Self> {
        if stages.is_empty() {
            return Err(DesignError::InvalidConfig(
                "stage plan must contain at least one stage".to_string(),
            ));
        }
        for (i, s) in stages.iter().enumerate() {
            if s.trim().is_empty() {
                return Err(DesignError::InvalidConfig(format!(
                    "stage plan entry {i} is blank"
                )));
            }
            if stages[..i].contains(s) {
                return Err(DesignError::InvalidConfig(format!(
                    "stage plan lists {s} more than once"
                )));
            }
        }
        Ok(Self { stages })
    }

    pub fn position(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s == stage)
    }

    /// Registration stage.
    pub fn initial(&self) -> &str {
        &self.stages[0]
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.position(stage).is_some()
    }

    /// Fails unless `stage` is in the plan after the registration stage,
    /// so a registered chip can advance to it.
    pub fn ensure_reachable(&self, stage: &str) -> Result<()> {
        match self.position(stage) {
            Some(pos) if pos > 0 => Ok(()),
            Some(_) => Err(DesignError::InvalidConfig(format!(
                "stage plan registers chips at {stage}; it must come later"
            ))),
            None => Err(DesignError::InvalidConfig(format!(
                "stage plan [{}] has no {stage} stage",
                self.stages.join(", ")
            ))),
        }
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<String>> for StagePlan {
    type Error = DesignError;

    fn try_from(stages: Vec<String>) -> Result<Self> {
        Self::new(stages)
    }
}

impl From<StagePlan> for Vec<String> {
    fn from(plan: StagePlan) -> Self {
        plan.stages
    }
}

/// Data captured at a stage transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Requirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<ArchitectureSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub notes: serde_json::Value,
}

impl StagePayload {
    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_snapshot(mut self, snapshot: ArchitectureSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisResult) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_quality(mut self, quality: QualityReport) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_notes(mut self, notes: serde_json::Value) -> Self {
        self.notes = notes;
        self
    }
}

/// One immutable entry of a chip's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEntry {
    pub seq: u64,
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub payload: StagePayload,
}

impl TryFrom<StoredEntry> for StageEntry {
    type Error = DesignError;

    fn try_from(stored: StoredEntry) -> Result<Self> {
        Ok(Self {
            seq: stored.seq,
            stage: stored.stage,
            timestamp: stored.timestamp,
            payload: serde_json::from_value(stored.payload)?,
        })
    }
}

/// Ordered lifecycle history of one chip.
///
/// Iteration is lazy and restartable: each call to [`LifecycleHistory::iter`]
/// starts again from the registration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleHistory {
    pub chip_id: String,
    entries: Vec<StageEntry>,
}

impl LifecycleHistory {
    pub fn new(chip_id: impl Into<String>, entries: Vec<StageEntry>) -> Self {
        Self {
            chip_id: chip_id.into(),
            entries,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StageEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&StageEntry> {
        self.entries.last()
    }

    /// Stage names in order.
    pub fn stages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.stage.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a LifecycleHistory {
    type Item = &'a StageEntry;
    type IntoIter = std::slice::Iter<'a, StageEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
