//! Design requirements: the immutable input of a design session.

use std::collections::BTreeMap;

use chipforge_state::ContentDigest;
use serde::{Deserialize, Serialize};

use super::error::{DesignError, Result};

/// Custom constraint: upper bound on any processor's core count.
pub const MAX_CORES: &str = "max_cores";

/// Custom constraint: lower bound on any component's declared utilization.
pub const MIN_UTILIZATION: &str = "min_utilization";

/// Performance target a design must meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTarget {
    /// Target clock frequency in GHz.
    pub clock_ghz: f64,

    /// Optional sustained throughput target in GOPS
    /// (cores × GHz × utilization summed over compute components).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_gops: Option<f64>,
}

/// Requirements for one design session. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub performance: PerformanceTarget,

    /// Power ceiling in watts.
    pub power_ceiling_w: f64,

    /// Area ceiling in mm².
    pub area_ceiling_mm2: f64,

    /// Named numeric bounds. `max_cores` and `min_utilization` are
    /// interpreted by the generator and optimizer; others are carried as-is.
    #[serde(default)]
    pub custom_constraints: BTreeMap<String, f64>,
}

impl Requirements {
    pub fn new(clock_ghz: f64, power_ceiling_w: f64, area_ceiling_mm2: f64) -> Self {
        Self {
            performance: PerformanceTarget {
                clock_ghz,
                throughput_gops: None,
            },
            power_ceiling_w,
            area_ceiling_mm2,
            custom_constraints: BTreeMap::new(),
        }
    }

    pub fn with_throughput(mut self, throughput_gops: f64) -> Self {
        self.performance.throughput_gops = Some(throughput_gops);
        self
    }

    pub fn with_constraint(mut self, name: impl Into<String>, bound: f64) -> Self {
        self.custom_constraints.insert(name.into(), bound);
        self
    }

    pub fn clock_ghz(&self) -> f64 {
        self.performance.clock_ghz
    }

    pub fn throughput_gops(&self) -> Option<f64> {
        self.performance.throughput_gops
    }

    pub fn max_cores(&self) -> Option<u32> {
        self.custom_constraints
            .get(MAX_CORES)
            .map(|v| v.floor().max(1.0) as u32)
    }

    pub fn min_utilization(&self) -> Option<f64> {
        self.custom_constraints.get(MIN_UTILIZATION).copied()
    }

    /// Content identity of these requirements, bit-exact over every field.
    pub fn fingerprint(&self) -> ContentDigest {
        let mut buf = Vec::with_capacity(64 + 32 * self.custom_constraints.len());
        buf.extend_from_slice(&self.performance.clock_ghz.to_bits().to_le_bytes());
        match self.performance.throughput_gops {
            Some(t) => {
                buf.push(1);
                buf.extend_from_slice(&t.to_bits().to_le_bytes());
            }
            None => buf.push(0),
        }
        buf.extend_from_slice(&self.power_ceiling_w.to_bits().to_le_bytes());
        buf.extend_from_slice(&self.area_ceiling_mm2.to_bits().to_le_bytes());
        for (name, bound) in &self.custom_constraints {
            buf.extend_from_slice(&(name.len() as u64).to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(&bound.to_bits().to_le_bytes());
        }
        ContentDigest::from_bytes(&buf)
    }

    /// Reject targets and ceilings that are not finite and positive.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(DesignError::InvalidRequirements(format!(
                    "{name} must be finite and positive, got {v}"
                )))
            }
        };

        positive("performance.clock_ghz", self.performance.clock_ghz)?;
        if let Some(t) = self.performance.throughput_gops {
            positive("performance.throughput_gops", t)?;
        }
        positive("power_ceiling_w", self.power_ceiling_w)?;
        positive("area_ceiling_mm2", self.area_ceiling_mm2)?;

        for (name, bound) in &self.custom_constraints {
            if !bound.is_finite() {
                return Err(DesignError::InvalidRequirements(format!(
                    "custom constraint {name} must be finite, got {bound}"
                )));
            }
        }
        if let Some(u) = self.min_utilization() {
            if !(0.0..=1.0).contains(&u) {
                return Err(DesignError::InvalidRequirements(format!(
                    "{MIN_UTILIZATION} must be within [0, 1], got {u}"
                )));
            }
        }
        if let Some(&c) = self.custom_constraints.get(MAX_CORES) {
            if c < 1.0 {
                return Err(DesignError::InvalidRequirements(format!(
                    "{MAX_CORES} must be at least 1, got {c}"
                )));
            }
        }
        Ok(())
    }
}
