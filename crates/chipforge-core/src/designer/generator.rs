//! Seeded initial architecture generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GeneratorConfig;
use crate::domain::{
    ArchitectureSnapshot, Component, ComponentKind, ConnectivityGraph, DesignError, PowerVariant,
    Requirements, Result,
};

/// Headroom is drawn from this many equal steps between 0 and
/// `max_headroom` inclusive.
const HEADROOM_STEPS: u32 = 4;

const VARIANTS: [PowerVariant; 2] = [PowerVariant::Balanced, PowerVariant::LowPower];

/// Build the minimal revision-0 architecture for `requirements`.
///
/// Deterministic for a given seed. Returns `InfeasibleRequirements` when no
/// single-processor configuration fits both ceilings or when the
/// throughput target would need more than `max_cores` cores.
pub fn generate_initial(
    requirements: &Requirements,
    config: &GeneratorConfig,
    seed: u64,
) -> Result<ArchitectureSnapshot> {
    requirements.validate()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let step = rng.random_range(0..=HEADROOM_STEPS);
    let headroom = config.max_headroom * f64::from(step) / f64::from(HEADROOM_STEPS);

    let clock = requirements.clock_ghz();
    let mut frequencies = vec![clock * (1.0 + headroom)];
    if headroom > 0.0 {
        frequencies.push(clock);
    }

    let utilization = config
        .default_utilization
        .max(requirements.min_utilization().unwrap_or(0.0));

    let mut min_power_w = f64::INFINITY;
    let mut min_area_mm2 = f64::INFINITY;
    let mut core_limit_hit = None;

    for frequency in frequencies {
        let cores = cores_for(requirements, frequency, utilization);
        let over_core_limit = requirements.max_cores().is_some_and(|max| cores > max);

        for variant in VARIANTS {
            let cpu = Component::new("cpu0", ComponentKind::Processor, cores, frequency)
                .with_utilization(utilization)
                .with_variant(variant)
                .with_cost(config.processor_cost);
            let power = cpu.estimated_power_w();
            let area = cpu.estimated_area_mm2();
            min_power_w = min_power_w.min(power);
            min_area_mm2 = min_area_mm2.min(area);

            if over_core_limit {
                core_limit_hit = Some(cores);
                continue;
            }
            if power <= requirements.power_ceiling_w && area <= requirements.area_ceiling_mm2 {
                tracing::debug!(
                    seed,
                    frequency_ghz = frequency,
                    cores,
                    variant = ?variant,
                    "initial architecture generated"
                );
                return Ok(ArchitectureSnapshot::new(
                    0,
                    vec![cpu],
                    ConnectivityGraph::new(config.default_capacity),
                ));
            }
        }
    }

    let reason = match (core_limit_hit, requirements.max_cores()) {
        (Some(cores), Some(max)) => {
            format!("throughput target needs {cores} cores, above max_cores {max}")
        }
        _ => "no processor configuration fits within the power and area ceilings".to_string(),
    };
    Err(DesignError::InfeasibleRequirements {
        reason,
        min_power_w,
        power_ceiling_w: requirements.power_ceiling_w,
        min_area_mm2,
        area_ceiling_mm2: requirements.area_ceiling_mm2,
    })
}

/// Smallest core count whose throughput meets the target (1 without one).
fn cores_for(requirements: &Requirements, frequency: f64, utilization: f64) -> u32 {
    match requirements.throughput_gops() {
        Some(target) => {
            let needed = target / (frequency * utilization);
            // tolerate rounding noise so exact multiples do not gain a core
            ((needed - 1e-9).ceil().max(1.0)) as u32
        }
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::requirements::MAX_CORES;

    fn cfg() -> GeneratorConfig {
        GeneratorConfig::default()
    }

    #[test]
    fn test_reference_requirements_produce_single_processor() {
        let req = Requirements::new(2.0, 5.0, 50.0);
        let snap = generate_initial(&req, &cfg(), 42).expect("feasible");
        assert_eq!(snap.revision(), 0);
        assert_eq!(snap.components().len(), 1);
        let cpu = &snap.components()[0];
        assert_eq!(cpu.kind, ComponentKind::Processor);
        assert!(cpu.frequency_ghz >= 2.0);
        assert!(cpu.frequency_ghz <= 2.0 * 1.1 + 1e-12);
        assert!(snap.estimated_power_w() <= 5.0);
        assert!(snap.estimated_area_mm2() <= 50.0);
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let req = Requirements::new(2.0, 5.0, 50.0);
        for seed in [0, 1, 7, 99, u64::MAX] {
            let a = generate_initial(&req, &cfg(), seed).expect("feasible");
            let b = generate_initial(&req, &cfg(), seed).expect("feasible");
            assert_eq!(a.id(), b.id());
        }
    }

    #[test]
    fn test_throughput_target_sizes_core_count() {
        // 2.4 GOPS at 2.0 GHz and 0.6 utilization needs exactly 2 cores
        let config = GeneratorConfig {
            max_headroom: 0.0,
            ..cfg()
        };
        let req = Requirements::new(2.0, 5.0, 50.0).with_throughput(2.4);
        let snap = generate_initial(&req, &config, 3).expect("feasible");
        assert_eq!(snap.components()[0].cores, 2);
        assert!(snap.throughput_gops() >= 2.4 - 1e-9);
    }

    #[test]
    fn test_falls_back_to_low_power_variant() {
        // balanced draws 0.71 W at 2 GHz, low power 0.62 W
        let config = GeneratorConfig {
            max_headroom: 0.0,
            ..cfg()
        };
        let req = Requirements::new(2.0, 0.65, 50.0);
        let snap = generate_initial(&req, &config, 0).expect("feasible");
        assert_eq!(snap.components()[0].variant, PowerVariant::LowPower);
    }

    #[test]
    fn test_power_ceiling_below_minimum_is_infeasible() {
        let req = Requirements::new(2.0, 0.1, 50.0);
        let err = generate_initial(&req, &cfg(), 1).unwrap_err();
        match err {
            DesignError::InfeasibleRequirements {
                min_power_w,
                power_ceiling_w,
                ..
            } => {
                assert!(min_power_w > power_ceiling_w);
                assert_eq!(power_ceiling_w, 0.1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_max_cores_constraint_is_enforced() {
        let req = Requirements::new(2.0, 50.0, 500.0)
            .with_throughput(10.0)
            .with_constraint(MAX_CORES, 2.0);
        let err = generate_initial(&req, &cfg(), 1).unwrap_err();
        assert!(err.to_string().contains("max_cores"));
    }

    #[test]
    fn test_invalid_requirements_rejected() {
        let req = Requirements::new(-1.0, 5.0, 50.0);
        assert!(matches!(
            generate_initial(&req, &cfg(), 1),
            Err(DesignError::InvalidRequirements(_))
        ));
    }
}
