//! Perturbation policy: derive the next candidate from the weakest dimension.
//!
//! Dimensions are tried from lowest to highest score. Each dimension has an
//! ordered list of moves; when every move for a dimension is exhausted the
//! policy falls through to the next-lowest dimension. A `None` result means
//! no move applies anywhere, which the optimizer treats as a local optimum.

use serde::{Deserialize, Serialize};

use crate::analyzer::{component_fitness, connected_sets};
use crate::config::OptimizerConfig;
use crate::domain::{
    AnalysisResult, ArchitectureSnapshot, Component, ComponentKind, ConnectivityGraph, Dimension,
    Requirements,
};

/// Throughput comparisons tolerate float rounding of this size.
const THROUGHPUT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationAction {
    LowerUtilization,
    SwapVariant,
    DropCore,
    AddCore,
    RaiseFrequency,
    ConnectComponent,
    WidenFabric,
}

/// One auditable move applied between two revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub dimension: Dimension,
    pub action: PerturbationAction,
    /// Component the move touched, if any.
    pub component: Option<String>,
    pub rationale: String,
}

struct Move {
    action: PerturbationAction,
    component: Option<String>,
    components: Vec<Component>,
    graph: ConnectivityGraph,
    rationale: String,
}

/// Propose the next revision of `snapshot`, or `None` when no move applies.
pub fn propose(
    snapshot: &ArchitectureSnapshot,
    analysis: &AnalysisResult,
    requirements: &Requirements,
    config: &OptimizerConfig,
) -> Option<(ArchitectureSnapshot, Perturbation)> {
    for (dimension, score) in analysis.scores.ascending() {
        if score >= 1.0 {
            continue;
        }
        let candidate = match dimension {
            Dimension::Power => reduce_power(snapshot, requirements, config),
            Dimension::Area => reduce_area(snapshot, requirements),
            Dimension::Performance => raise_performance(snapshot, analysis, requirements, config),
            Dimension::Component => raise_component_fitness(snapshot, requirements, config),
            Dimension::Connectivity => improve_connectivity(snapshot, analysis, config),
        };
        if let Some(mv) = candidate {
            let next = snapshot.derive(mv.components, mv.graph);
            return Some((
                next,
                Perturbation {
                    dimension,
                    action: mv.action,
                    component: mv.component,
                    rationale: mv.rationale,
                },
            ));
        }
    }
    None
}

fn throughput_holds(components: &[Component], requirements: &Requirements) -> bool {
    match requirements.throughput_gops() {
        Some(target) => {
            components.iter().map(Component::throughput_gops).sum::<f64>() >= target - THROUGHPUT_SLACK
        }
        None => true,
    }
}

fn utilization_floor(requirements: &Requirements, config: &OptimizerConfig) -> f64 {
    config
        .min_utilization
        .max(requirements.min_utilization().unwrap_or(0.0))
}

/// Copy of the snapshot's components with `index` rewritten by `edit`.
fn edited(snapshot: &ArchitectureSnapshot, index: usize, edit: impl FnOnce(&mut Component)) -> Vec<Component> {
    let mut components = snapshot.components().to_vec();
    edit(&mut components[index]);
    components
}

fn component_move(
    snapshot: &ArchitectureSnapshot,
    action: PerturbationAction,
    index: usize,
    components: Vec<Component>,
    rationale: String,
) -> Move {
    Move {
        action,
        component: Some(snapshot.components()[index].name.clone()),
        components,
        graph: snapshot.graph().clone(),
        rationale,
    }
}

/// Indices sorted by `key`, largest first.
fn by_descending(snapshot: &ArchitectureSnapshot, key: impl Fn(&Component) -> f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..snapshot.components().len()).collect();
    order.sort_by(|a, b| {
        let ka = key(&snapshot.components()[*a]);
        let kb = key(&snapshot.components()[*b]);
        kb.total_cmp(&ka)
    });
    order
}

fn reduce_power(
    snapshot: &ArchitectureSnapshot,
    requirements: &Requirements,
    config: &OptimizerConfig,
) -> Option<Move> {
    let floor = utilization_floor(requirements, config);

    for i in by_descending(snapshot, Component::estimated_power_w) {
        let c = &snapshot.components()[i];

        let lowered = (c.utilization - config.utilization_step).max(floor);
        if lowered < c.utilization {
            let components = edited(snapshot, i, |c| c.utilization = lowered);
            if throughput_holds(&components, requirements) {
                let rationale = format!(
                    "{} utilization {:.2} -> {:.2} to cut dynamic power",
                    c.name, c.utilization, lowered
                );
                return Some(component_move(snapshot, PerturbationAction::LowerUtilization, i, components, rationale));
            }
        }

        if let Some(variant) = c.variant.lower() {
            let components = edited(snapshot, i, |c| c.variant = variant);
            let rationale = format!("{} variant {:?} -> {:?}", c.name, c.variant, variant);
            return Some(component_move(snapshot, PerturbationAction::SwapVariant, i, components, rationale));
        }

        if let Some(mv) = drop_core(snapshot, requirements, i) {
            return Some(mv);
        }
    }
    None
}

fn drop_core(snapshot: &ArchitectureSnapshot, requirements: &Requirements, index: usize) -> Option<Move> {
    let c = &snapshot.components()[index];
    if c.cores <= 1 {
        return None;
    }
    let components = edited(snapshot, index, |c| c.cores -= 1);
    if !throughput_holds(&components, requirements) {
        return None;
    }
    let rationale = format!("{} cores {} -> {}", c.name, c.cores, c.cores - 1);
    Some(component_move(snapshot, PerturbationAction::DropCore, index, components, rationale))
}

fn reduce_area(snapshot: &ArchitectureSnapshot, requirements: &Requirements) -> Option<Move> {
    let order = by_descending(snapshot, Component::estimated_area_mm2);
    for &i in &order {
        if let Some(mv) = drop_core(snapshot, requirements, i) {
            return Some(mv);
        }
    }
    // Area cannot shrink further; trade power instead so the overall score
    // can still move.
    for &i in &order {
        let c = &snapshot.components()[i];
        if let Some(variant) = c.variant.lower() {
            let components = edited(snapshot, i, |c| c.variant = variant);
            let rationale = format!("{} variant {:?} -> {:?} (area exhausted)", c.name, c.variant, variant);
            return Some(component_move(snapshot, PerturbationAction::SwapVariant, i, components, rationale));
        }
    }
    None
}

fn raise_frequency(
    snapshot: &ArchitectureSnapshot,
    index: usize,
    config: &OptimizerConfig,
) -> Option<Move> {
    let c = &snapshot.components()[index];
    if c.frequency_ghz >= config.max_frequency_ghz {
        return None;
    }
    let raised = (c.frequency_ghz + config.frequency_step_ghz).min(config.max_frequency_ghz);
    let components = edited(snapshot, index, |c| c.frequency_ghz = raised);
    let rationale = format!("{} frequency {:.2} -> {:.2} GHz", c.name, c.frequency_ghz, raised);
    Some(component_move(snapshot, PerturbationAction::RaiseFrequency, index, components, rationale))
}

fn add_core(
    snapshot: &ArchitectureSnapshot,
    requirements: &Requirements,
    index: usize,
) -> Option<Move> {
    let c = &snapshot.components()[index];
    if requirements.max_cores().is_some_and(|max| c.cores >= max) {
        return None;
    }
    let components = edited(snapshot, index, |c| c.cores += 1);
    let rationale = format!("{} cores {} -> {}", c.name, c.cores, c.cores + 1);
    Some(component_move(snapshot, PerturbationAction::AddCore, index, components, rationale))
}

/// Slowest-first order of the components matching `filter`.
fn slowest_first(snapshot: &ArchitectureSnapshot, filter: impl Fn(&Component) -> bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..snapshot.components().len())
        .filter(|i| filter(&snapshot.components()[*i]))
        .collect();
    order.sort_by(|a, b| {
        snapshot.components()[*a]
            .frequency_ghz
            .total_cmp(&snapshot.components()[*b].frequency_ghz)
    });
    order
}

fn raise_performance(
    snapshot: &ArchitectureSnapshot,
    analysis: &AnalysisResult,
    requirements: &Requirements,
    config: &OptimizerConfig,
) -> Option<Move> {
    let clock = requirements.clock_ghz();
    let processors = slowest_first(snapshot, |c| c.kind == ComponentKind::Processor);

    for &i in &processors {
        if snapshot.components()[i].frequency_ghz < clock {
            if let Some(mv) = raise_frequency(snapshot, i, config) {
                return Some(mv);
            }
        }
    }

    if !throughput_holds(snapshot.components(), requirements) {
        let compute = slowest_first(snapshot, |c| c.kind.is_compute());
        for &i in compute.iter().rev() {
            if let Some(mv) = add_core(snapshot, requirements, i) {
                return Some(mv);
            }
        }
    }

    // Raw targets are met; the shortfall is interconnect derating.
    if analysis.effective_frequency_ghz < clock {
        for &i in &processors {
            if let Some(mv) = raise_frequency(snapshot, i, config) {
                return Some(mv);
            }
        }
    }
    None
}

fn raise_component_fitness(
    snapshot: &ArchitectureSnapshot,
    requirements: &Requirements,
    config: &OptimizerConfig,
) -> Option<Move> {
    let components = snapshot.components();
    let n_compute = components.iter().filter(|c| c.kind.is_compute()).count();

    let mut order: Vec<(usize, f64)> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (i, component_fitness(c, requirements, n_compute)))
        .filter(|(_, fit)| *fit < 1.0)
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    for (i, _) in order {
        let c = &components[i];
        if c.frequency_ghz < requirements.clock_ghz() {
            if let Some(mv) = raise_frequency(snapshot, i, config) {
                return Some(mv);
            }
        } else if c.kind.is_compute() {
            if let Some(mv) = add_core(snapshot, requirements, i) {
                return Some(mv);
            }
        }
    }
    None
}

fn improve_connectivity(
    snapshot: &ArchitectureSnapshot,
    analysis: &AnalysisResult,
    config: &OptimizerConfig,
) -> Option<Move> {
    let components = snapshot.components();
    let graph = snapshot.graph();

    // bridge the largest connected set to the next one, so each move
    // strictly grows it; sets are ordered largest first
    let sets = connected_sets(snapshot);
    if let [largest, next_set, ..] = sets.as_slice() {
        let anchor = &components[largest[0]];
        let stray = &components[next_set[0]];
        let next = graph
            .clone()
            .with_link(anchor.name.clone(), stray.name.clone(), config.link_cost);
        return Some(Move {
            action: PerturbationAction::ConnectComponent,
            component: Some(stray.name.clone()),
            components: components.to_vec(),
            graph: next,
            rationale: format!(
                "link {} to {} ({} of {} components connected)",
                stray.name,
                anchor.name,
                largest.len(),
                components.len()
            ),
        });
    }

    if analysis.congestion > 0.0 {
        let capacity = if graph.capacity > 0.0 {
            graph.capacity * config.capacity_growth
        } else {
            graph.total_cost().max(config.link_cost) * config.capacity_growth
        };
        let mut next = graph.clone();
        next.capacity = capacity;
        return Some(Move {
            action: PerturbationAction::WidenFabric,
            component: None,
            components: components.to_vec(),
            graph: next,
            rationale: format!("fabric capacity {:.2} -> {:.2}", graph.capacity, capacity),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{largest_connected_set, Analyzer};
    use crate::config::PipelineConfig;
    use crate::domain::PowerVariant;

    fn step(snapshot: &ArchitectureSnapshot, req: &Requirements) -> Option<(ArchitectureSnapshot, Perturbation)> {
        let config = PipelineConfig::default();
        let analysis = Analyzer::from_config(&config).analyze(snapshot, req);
        propose(snapshot, &analysis, req, &config.optimizer)
    }

    #[test]
    fn test_power_pressure_lowers_utilization_first() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![Component::new("cpu0", ComponentKind::Processor, 4, 2.0)],
            ConnectivityGraph::new(16.0),
        );
        // area comfortably met; power is the weakest dimension
        let req = Requirements::new(2.0, 2.5, 1000.0);
        let (next, p) = step(&snap, &req).expect("move");
        assert_eq!(p.dimension, Dimension::Power);
        assert_eq!(p.action, PerturbationAction::LowerUtilization);
        assert_eq!(next.revision(), 1);
        assert!(next.components()[0].utilization < 0.6);
        assert!(next.estimated_power_w() < snap.estimated_power_w());
    }

    #[test]
    fn test_power_move_respects_throughput() {
        // utilization cannot drop without losing throughput, so the variant swaps
        let snap = ArchitectureSnapshot::new(
            0,
            vec![Component::new("cpu0", ComponentKind::Processor, 2, 2.0)],
            ConnectivityGraph::new(16.0),
        );
        let req = Requirements::new(2.0, 1.3, 1000.0).with_throughput(2.4);
        let (next, p) = step(&snap, &req).expect("move");
        assert_eq!(p.action, PerturbationAction::SwapVariant);
        assert_eq!(next.components()[0].variant, PowerVariant::LowPower);
        assert_eq!(next.components()[0].utilization, 0.6);
    }

    #[test]
    fn test_slow_processor_raises_frequency() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![Component::new("cpu0", ComponentKind::Processor, 1, 1.0)],
            ConnectivityGraph::new(16.0),
        );
        let req = Requirements::new(2.0, 50.0, 500.0);
        let (next, p) = step(&snap, &req).expect("move");
        assert_eq!(p.action, PerturbationAction::RaiseFrequency);
        assert!((next.components()[0].frequency_ghz - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_component_gets_linked() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                Component::new("cpu0", ComponentKind::Processor, 1, 2.0),
                Component::new("sram", ComponentKind::Memory, 1, 2.0),
            ],
            ConnectivityGraph::new(16.0),
        );
        let req = Requirements::new(2.0, 50.0, 500.0);
        let (next, p) = step(&snap, &req).expect("move");
        assert_eq!(p.dimension, Dimension::Connectivity);
        assert_eq!(p.action, PerturbationAction::ConnectComponent);
        assert_eq!(next.graph().links.len(), 1);
    }

    #[test]
    fn test_separate_clusters_get_bridged() {
        let snap = ArchitectureSnapshot::new(
            0,
            vec![
                Component::new("cpu0", ComponentKind::Processor, 1, 2.0),
                Component::new("sram", ComponentKind::Memory, 1, 2.0),
                Component::new("dma", ComponentKind::Io, 1, 2.0),
                Component::new("npu", ComponentKind::Accelerator, 1, 2.0),
            ],
            ConnectivityGraph::new(16.0)
                .with_link("cpu0", "sram", 1.0)
                .with_link("dma", "npu", 1.0),
        );
        let config = PipelineConfig::default();
        let req = Requirements::new(2.0, 50.0, 500.0);
        let analysis = Analyzer::from_config(&config).analyze(&snap, &req);
        assert!((analysis.scores.connectivity - (1.0 - 2.0 / 16.0) * 0.5).abs() < 1e-12);

        let m = improve_connectivity(&snap, &analysis, &config.optimizer).expect("move");
        assert_eq!(m.action, PerturbationAction::ConnectComponent);
        assert_eq!(m.component.as_deref(), Some("dma"));

        let next = snap.derive(m.components, m.graph);
        assert_eq!(largest_connected_set(&next), 4);
        assert_eq!(next.graph().links.len(), 3);
    }

    #[test]
    fn test_exhausted_moves_return_none() {
        // single core at the utilization floor on the lowest variant
        let snap = ArchitectureSnapshot::new(
            0,
            vec![Component::new("cpu0", ComponentKind::Processor, 1, 2.0)
                .with_utilization(0.2)
                .with_variant(PowerVariant::LowPower)],
            ConnectivityGraph::new(16.0),
        );
        let req = Requirements::new(2.0, 50.0, 500.0);
        assert!(step(&snap, &req).is_none());
    }
}
