//! Multi-dimensional architecture analysis.
//!
//! Every sub-analysis is a pure function of the snapshot, the requirements
//! and the analyzer configuration. Results are memoized per
//! (snapshot id, requirements fingerprint), so repeated calls return
//! bit-identical scores without recomputation. The memo holds at most
//! `cache_capacity` entries and is cleared when it fills up.

use std::collections::HashMap;
use std::sync::Mutex;

use chipforge_state::ContentDigest;

use crate::config::{AnalyzerConfig, PipelineConfig};
use crate::domain::{
    AnalysisResult, ArchitectureSnapshot, Component, ComponentKind, DimensionScores, Requirements,
    ScoreWeights, SnapshotId,
};

type CacheKey = (SnapshotId, ContentDigest);

pub struct Analyzer {
    weights: ScoreWeights,
    config: AnalyzerConfig,
    cache: Mutex<HashMap<CacheKey, AnalysisResult>>,
}

impl Analyzer {
    pub fn new(weights: ScoreWeights, config: AnalyzerConfig) -> Self {
        Self {
            weights,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.weights, config.analyzer.clone())
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score `snapshot` against `requirements`.
    pub fn analyze(&self, snapshot: &ArchitectureSnapshot, requirements: &Requirements) -> AnalysisResult {
        let key = (snapshot.id().clone(), requirements.fingerprint());
        // A poisoned cache only loses memoization; results are recomputed.
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let result = self.compute(snapshot, requirements);
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= self.config.cache_capacity {
                tracing::debug!(entries = cache.len(), "analysis memo full, clearing");
                cache.clear();
            }
            cache.insert(key, result.clone());
        }
        result
    }

    /// Number of memoized results.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn compute(&self, snapshot: &ArchitectureSnapshot, requirements: &Requirements) -> AnalysisResult {
        let component = component_score(snapshot, requirements);
        let (connectivity, congestion) = connectivity_score(snapshot);
        let (performance, effective_frequency_ghz) =
            performance_score(snapshot, requirements, connectivity, self.config.interconnect_derating);
        let estimated_power_w = snapshot.estimated_power_w();
        let estimated_area_mm2 = snapshot.estimated_area_mm2();

        let scores = DimensionScores {
            component,
            connectivity,
            performance,
            power: headroom(estimated_power_w, requirements.power_ceiling_w),
            area: headroom(estimated_area_mm2, requirements.area_ceiling_mm2),
        };

        let result = AnalysisResult {
            snapshot_id: snapshot.id().clone(),
            revision: snapshot.revision(),
            overall: self.weights.combine(&scores),
            scores,
            congestion,
            effective_frequency_ghz,
            estimated_power_w,
            estimated_area_mm2,
        };
        tracing::debug!(
            snapshot = %snapshot.id().short(),
            revision = result.revision,
            overall = result.overall,
            "snapshot analyzed"
        );
        result
    }
}

/// min(1, actual / target), treating a non-positive target as met.
fn ratio(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        1.0
    } else {
        (actual / target).clamp(0.0, 1.0)
    }
}

/// 1 - min(1, estimate / ceiling).
fn headroom(estimate: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 {
        return 0.0;
    }
    1.0 - (estimate / ceiling).clamp(0.0, 1.0)
}

fn compute_count(snapshot: &ArchitectureSnapshot) -> usize {
    snapshot.components().iter().filter(|c| c.kind.is_compute()).count()
}

/// Fitness of one component against the targets. Compute components also
/// carry an equal share of the throughput target.
pub(crate) fn component_fitness(
    component: &Component,
    requirements: &Requirements,
    compute_count: usize,
) -> f64 {
    let frequency_fit = ratio(component.frequency_ghz, requirements.clock_ghz());
    match requirements.throughput_gops() {
        Some(target) if component.kind.is_compute() && compute_count > 0 => {
            let share = target / compute_count as f64;
            frequency_fit.min(ratio(component.throughput_gops(), share))
        }
        _ => frequency_fit,
    }
}

fn component_score(snapshot: &ArchitectureSnapshot, requirements: &Requirements) -> f64 {
    let components = snapshot.components();
    if components.is_empty() {
        return 0.0;
    }
    let n_compute = compute_count(snapshot);
    let total: f64 = components
        .iter()
        .map(|c| component_fitness(c, requirements, n_compute))
        .sum();
    total / components.len() as f64
}

/// Returns (score, congestion).
fn connectivity_score(snapshot: &ArchitectureSnapshot) -> (f64, f64) {
    let graph = snapshot.graph();
    let total_cost = graph.total_cost();
    let congestion = if graph.capacity <= 0.0 {
        if total_cost > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (total_cost / graph.capacity).clamp(0.0, 1.0)
    };

    let n = snapshot.components().len();
    if n == 0 {
        return (0.0, congestion);
    }
    let connected = largest_connected_set(snapshot) as f64 / n as f64;
    ((1.0 - congestion) * connected, congestion)
}

/// Size of the largest connected set of components.
pub(crate) fn largest_connected_set(snapshot: &ArchitectureSnapshot) -> usize {
    connected_sets(snapshot).first().map_or(0, Vec::len)
}

/// Component indices grouped by connected set, largest first. Sets of equal
/// size keep the order of their first component. Links naming unknown
/// components are ignored.
pub(crate) fn connected_sets(snapshot: &ArchitectureSnapshot) -> Vec<Vec<usize>> {
    let components = snapshot.components();
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    let mut parent: Vec<usize> = (0..components.len()).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for link in &snapshot.graph().links {
        if let (Some(&a), Some(&b)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) {
            let ra = find(&mut parent, a);
            let rb = find(&mut parent, b);
            if ra != rb {
                parent[ra] = rb;
            }
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut sets: Vec<Vec<usize>> = Vec::new();
    for i in 0..components.len() {
        let root = find(&mut parent, i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            sets.push(Vec::new());
            sets.len() - 1
        });
        sets[slot].push(i);
    }
    sets.sort_by(|a, b| b.len().cmp(&a.len()));
    sets
}

/// Returns (score, effective frequency of the fastest processor).
fn performance_score(
    snapshot: &ArchitectureSnapshot,
    requirements: &Requirements,
    connectivity: f64,
    derating: f64,
) -> (f64, f64) {
    let factor = 1.0 - derating * (1.0 - connectivity);
    let effective = snapshot
        .components()
        .iter()
        .filter(|c| c.kind == ComponentKind::Processor)
        .map(|c| c.frequency_ghz * factor)
        .fold(None, |best: Option<f64>, f| Some(best.map_or(f, |b| b.max(f))));

    let Some(effective) = effective else {
        return (0.0, 0.0);
    };

    let mut score = ratio(effective, requirements.clock_ghz());
    if let Some(target) = requirements.throughput_gops() {
        let effective_throughput: f64 = snapshot
            .components()
            .iter()
            .map(|c| c.throughput_gops() * factor)
            .sum();
        score = score.min(ratio(effective_throughput, target));
    }
    (score, effective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectivityGraph, Dimension};

    fn analyzer() -> Analyzer {
        Analyzer::from_config(&PipelineConfig::default())
    }

    fn single_cpu(freq: f64) -> ArchitectureSnapshot {
        ArchitectureSnapshot::new(
            0,
            vec![Component::new("cpu0", ComponentKind::Processor, 1, freq)],
            ConnectivityGraph::new(16.0),
        )
    }

    #[test]
    fn test_single_processor_meeting_target() {
        let req = Requirements::new(2.0, 5.0, 50.0);
        let result = analyzer().analyze(&single_cpu(2.0), &req);
        assert_eq!(result.scores.component, 1.0);
        assert_eq!(result.scores.connectivity, 1.0);
        assert_eq!(result.scores.performance, 1.0);
        assert!(result.scores.power > 0.0 && result.scores.power < 1.0);
        assert!((result.scores.area - (1.0 - 13.0 / 50.0)).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&result.overall));
    }

    #[test]
    fn test_power_over_ceiling_scores_zero() {
        let req = Requirements::new(2.0, 0.5, 50.0);
        let result = analyzer().analyze(&single_cpu(2.0), &req);
        assert_eq!(result.scores.get(Dimension::Power), 0.0);
    }

    #[test]
    fn test_empty_snapshot_scores_zero_structure() {
        let empty = ArchitectureSnapshot::new(0, vec![], ConnectivityGraph::new(16.0));
        let result = analyzer().analyze(&empty, &Requirements::new(2.0, 5.0, 50.0));
        assert_eq!(result.scores.component, 0.0);
        assert_eq!(result.scores.connectivity, 0.0);
        assert_eq!(result.scores.performance, 0.0);
        assert_eq!(result.effective_frequency_ghz, 0.0);
    }

    #[test]
    fn test_disconnected_graph_penalized_and_derates_frequency() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                Component::new("cpu0", ComponentKind::Processor, 1, 2.0),
                Component::new("sram", ComponentKind::Memory, 1, 2.0),
            ],
            ConnectivityGraph::new(16.0),
        );
        let result = analyzer().analyze(&snap, &Requirements::new(2.0, 5.0, 50.0));
        assert!((result.scores.connectivity - 0.5).abs() < 1e-12);
        // 2.0 GHz * (1 - 0.5 * 0.5)
        assert!((result.effective_frequency_ghz - 1.5).abs() < 1e-12);
        assert!((result.scores.performance - 0.75).abs() < 1e-12);

        let linked = snap.derive(
            snap.components().to_vec(),
            ConnectivityGraph::new(16.0).with_link("cpu0", "sram", 4.0),
        );
        let result = analyzer().analyze(&linked, &Requirements::new(2.0, 5.0, 50.0));
        assert!((result.congestion - 0.25).abs() < 1e-12);
        assert!((result.scores.connectivity - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_capacity_with_cost_is_fully_congested() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                Component::new("cpu0", ComponentKind::Processor, 1, 2.0),
                Component::new("sram", ComponentKind::Memory, 1, 2.0),
            ],
            ConnectivityGraph::new(0.0).with_link("cpu0", "sram", 1.0),
        );
        let result = analyzer().analyze(&snap, &Requirements::new(2.0, 5.0, 50.0));
        assert_eq!(result.congestion, 1.0);
        assert_eq!(result.scores.connectivity, 0.0);
    }

    #[test]
    fn test_throughput_target_limits_component_and_performance() {
        // 1 core * 2 GHz * 0.6 = 1.2 GOPS against a 2.4 GOPS target
        let req = Requirements::new(2.0, 5.0, 50.0).with_throughput(2.4);
        let result = analyzer().analyze(&single_cpu(2.0), &req);
        assert!((result.scores.component - 0.5).abs() < 1e-12);
        assert!((result.scores.performance - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_analysis_is_memoized_and_idempotent() {
        let a = analyzer();
        let req = Requirements::new(2.0, 5.0, 50.0);
        let snap = single_cpu(2.2);
        let first = a.analyze(&snap, &req);
        let second = a.analyze(&snap, &req);
        assert_eq!(first, second);
        assert_eq!(first.overall.to_bits(), second.overall.to_bits());
        assert_eq!(a.cache_len(), 1);

        a.analyze(&snap, &Requirements::new(2.0, 4.0, 50.0));
        assert_eq!(a.cache_len(), 2);
    }

    #[test]
    fn test_memo_is_cleared_when_full() {
        let config = AnalyzerConfig {
            cache_capacity: 2,
            ..AnalyzerConfig::default()
        };
        let a = Analyzer::new(ScoreWeights::default(), config);
        let req = Requirements::new(2.0, 5.0, 50.0);

        let first = a.analyze(&single_cpu(1.8), &req);
        a.analyze(&single_cpu(2.0), &req);
        assert_eq!(a.cache_len(), 2);
        a.analyze(&single_cpu(2.2), &req);
        assert_eq!(a.cache_len(), 1);

        let again = a.analyze(&single_cpu(1.8), &req);
        assert_eq!(first.overall.to_bits(), again.overall.to_bits());
        assert!(a.cache_len() <= 2);
    }

    #[test]
    fn test_connected_sets_largest_first() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                Component::new("a", ComponentKind::Processor, 1, 2.0),
                Component::new("b", ComponentKind::Memory, 1, 2.0),
                Component::new("c", ComponentKind::Memory, 1, 2.0),
                Component::new("d", ComponentKind::Io, 1, 2.0),
                Component::new("e", ComponentKind::Io, 1, 2.0),
            ],
            ConnectivityGraph::new(16.0)
                .with_link("a", "b", 1.0)
                .with_link("c", "d", 1.0)
                .with_link("d", "e", 1.0)
                .with_link("e", "ghost", 1.0),
        );
        assert_eq!(connected_sets(&snap), vec![vec![2, 3, 4], vec![0, 1]]);
        assert_eq!(largest_connected_set(&snap), 3);
    }
}
