//! Quality evaluation: reliability, defect risk and pass/fail verdicts.

use std::collections::HashMap;

use crate::config::QualityConfig;
use crate::domain::{
    AnalysisResult, ArchitectureSnapshot, ComponentKind, Dimension, FailureCategory, FailureMode,
    QualityReport, Verdict,
};

#[derive(Debug, Clone, Default)]
pub struct QualityEvaluator {
    config: QualityConfig,
}

impl QualityEvaluator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Evaluate one analysis result. `snapshot` must be the snapshot the
    /// analysis was computed for.
    pub fn evaluate(&self, analysis: &AnalysisResult, snapshot: &ArchitectureSnapshot) -> QualityReport {
        let cfg = &self.config;
        let redundancy_bonus = redundancy_bonus(snapshot, cfg.redundancy_step, cfg.redundancy_cap);
        let reliability = (analysis.overall + redundancy_bonus).clamp(0.0, 1.0);
        let defect_probability =
            ((1.0 - reliability) + cfg.congestion_penalty * analysis.congestion).clamp(0.0, 1.0);

        let failure_modes: Vec<FailureMode> = Dimension::ALL
            .iter()
            .filter_map(|d| {
                let score = analysis.scores.get(*d);
                (score < cfg.risk_threshold).then(|| FailureMode {
                    category: FailureCategory::for_dimension(*d),
                    dimension: *d,
                    severity: ((cfg.risk_threshold - score) / cfg.risk_threshold).clamp(0.0, 1.0),
                })
            })
            .collect();

        let mut block_reasons = Vec::new();
        if reliability < cfg.acceptance_threshold {
            block_reasons.push(format!(
                "reliability {reliability:.3} below acceptance threshold {:.3}",
                cfg.acceptance_threshold
            ));
        }
        for mode in failure_modes.iter().filter(|m| m.severity > cfg.critical_severity) {
            block_reasons.push(format!(
                "{} severity {:.3} exceeds critical cutoff {:.3}",
                mode.category, mode.severity, cfg.critical_severity
            ));
        }

        let verdict = if block_reasons.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        QualityReport {
            snapshot_id: analysis.snapshot_id.clone(),
            reliability,
            defect_probability,
            redundancy_bonus,
            failure_modes,
            verdict,
            block_reasons,
        }
    }
}

/// `step` per critical kind instantiated at least twice, capped at `cap`.
fn redundancy_bonus(snapshot: &ArchitectureSnapshot, step: f64, cap: f64) -> f64 {
    let mut counts: HashMap<ComponentKind, usize> = HashMap::new();
    for c in snapshot.components().iter().filter(|c| c.kind.is_critical()) {
        *counts.entry(c.kind).or_insert(0) += 1;
    }
    let redundant = counts.values().filter(|n| **n >= 2).count();
    (step * redundant as f64).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Component, ConnectivityGraph, DimensionScores};

    fn analysis(snapshot: &ArchitectureSnapshot, scores: DimensionScores, overall: f64, congestion: f64) -> AnalysisResult {
        AnalysisResult {
            snapshot_id: snapshot.id().clone(),
            revision: snapshot.revision(),
            scores,
            overall,
            congestion,
            effective_frequency_ghz: 2.0,
            estimated_power_w: 1.0,
            estimated_area_mm2: 10.0,
        }
    }

    fn all(score: f64) -> DimensionScores {
        DimensionScores {
            component: score,
            connectivity: score,
            performance: score,
            power: score,
            area: score,
        }
    }

    fn cpu(name: &str) -> Component {
        Component::new(name, ComponentKind::Processor, 1, 2.0)
    }

    #[test]
    fn test_healthy_analysis_passes() {
        let snap = ArchitectureSnapshot::new(0, vec![cpu("cpu0")], ConnectivityGraph::new(16.0));
        let report = QualityEvaluator::default().evaluate(&analysis(&snap, all(0.9), 0.9, 0.0), &snap);
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.failure_modes.is_empty());
        assert!(report.block_reasons.is_empty());
        assert!((report.defect_probability - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_low_power_score_predicts_thermal_risk() {
        let snap = ArchitectureSnapshot::new(0, vec![cpu("cpu0")], ConnectivityGraph::new(16.0));
        let mut scores = all(1.0);
        scores.power = 0.0;
        let report = QualityEvaluator::default().evaluate(&analysis(&snap, scores, 0.8, 0.0), &snap);
        assert!(report.has_category(FailureCategory::ThermalRisk));
        let mode = &report.failure_modes[0];
        assert_eq!(mode.dimension, Dimension::Power);
        assert_eq!(mode.severity, 1.0);
        // reliability meets the threshold but the thermal mode is critical
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.block_reasons.len(), 1);
        assert!(report.block_reasons[0].contains("thermal-risk"));
    }

    #[test]
    fn test_redundancy_bonus_is_capped() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                cpu("cpu0"),
                cpu("cpu1"),
                Component::new("m0", ComponentKind::Memory, 1, 2.0),
                Component::new("m1", ComponentKind::Memory, 1, 2.0),
                Component::new("io0", ComponentKind::Io, 1, 2.0),
                Component::new("io1", ComponentKind::Io, 1, 2.0),
            ],
            ConnectivityGraph::new(16.0),
        );
        let report = QualityEvaluator::default().evaluate(&analysis(&snap, all(0.7), 0.7, 0.0), &snap);
        assert!((report.redundancy_bonus - 0.1).abs() < 1e-12);
        assert!((report.reliability - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_congestion_raises_defect_probability() {
        let snap = ArchitectureSnapshot::new(0, vec![cpu("cpu0")], ConnectivityGraph::new(16.0));
        let calm = QualityEvaluator::default().evaluate(&analysis(&snap, all(0.9), 0.9, 0.0), &snap);
        let busy = QualityEvaluator::default().evaluate(&analysis(&snap, all(0.9), 0.9, 0.5), &snap);
        assert!(busy.defect_probability > calm.defect_probability);
        assert!((busy.defect_probability - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_reliability_monotone_in_overall() {
        let snap = ArchitectureSnapshot::new(0, vec![cpu("cpu0")], ConnectivityGraph::new(16.0));
        let eval = QualityEvaluator::default();
        let mut last = -1.0;
        for step in 0..=10 {
            let overall = step as f64 / 10.0;
            let r = eval.evaluate(&analysis(&snap, all(overall), overall, 0.0), &snap).reliability;
            assert!(r >= last);
            last = r;
        }
    }
}
