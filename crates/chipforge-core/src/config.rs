//! Pipeline configuration.
//!
//! Loaded from TOML. Every section and field has a default, so an empty
//! file is a valid configuration. The `[weights]` table is pulled out and
//! checked on its own so a bad sum reports [`DesignError::InvalidWeights`].
//! The remaining bounds, including a stage plan that can reach DESIGN, are
//! checked by [`PipelineConfig::validate`], which `load` and `from_toml_str`
//! always run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::analysis::RawWeights;
use crate::domain::{
    stage, ComponentKind, DesignError, ResourceCost, Result, ScoreWeights, StagePlan,
};

/// Environment variable naming the configuration file used by the CLI.
pub const CONFIG_ENV: &str = "CHIPFORGE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Fraction of processor frequency lost at zero connectivity.
    pub interconnect_derating: f64,
    /// Analyses kept in the memo before it is cleared.
    pub cache_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            interconnect_derating: 0.5,
            cache_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Dimension scores below this emit a failure mode.
    pub risk_threshold: f64,
    /// Minimum reliability for a passing verdict.
    pub acceptance_threshold: f64,
    /// Any failure mode above this severity fails the verdict.
    pub critical_severity: f64,
    pub congestion_penalty: f64,
    pub redundancy_step: f64,
    pub redundancy_cap: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 0.5,
            acceptance_threshold: 0.8,
            critical_severity: 0.75,
            congestion_penalty: 0.3,
            redundancy_step: 0.05,
            redundancy_cap: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    /// Minimum overall-score gain that counts as progress.
    pub epsilon: f64,
    /// Consecutive non-improving iterations before stopping.
    pub stall_limit: u32,
    pub utilization_step: f64,
    /// Utilization floor when no `min_utilization` constraint is given.
    pub min_utilization: f64,
    pub frequency_step_ghz: f64,
    pub max_frequency_ghz: f64,
    /// Multiplier applied to fabric capacity when widening.
    pub capacity_growth: f64,
    /// Cost of a link added to bridge two connected sets.
    pub link_cost: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            epsilon: 0.001,
            stall_limit: 3,
            utilization_step: 0.1,
            min_utilization: 0.2,
            frequency_step_ghz: 0.1,
            max_frequency_ghz: 5.0,
            capacity_growth: 1.25,
            link_cost: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub default_utilization: f64,
    /// Upper bound of the seeded frequency headroom, as a fraction of the
    /// target clock.
    pub max_headroom: f64,
    pub default_capacity: f64,
    pub processor_cost: ResourceCost,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_utilization: 0.6,
            max_headroom: 0.1,
            default_capacity: 16.0,
            processor_cost: ComponentKind::Processor.default_cost(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub stages: StagePlan,
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| DesignError::InvalidConfig(e.to_string());

        let mut table: toml::Table = raw.parse().map_err(|e| invalid(&e))?;
        let weights = match table.remove("weights") {
            Some(value) => {
                let raw: RawWeights = value.try_into().map_err(|e| invalid(&e))?;
                Some(ScoreWeights::try_from(raw)?)
            }
            None => None,
        };

        let mut config: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e| invalid(&e))?;
        if let Some(weights) = weights {
            config.weights = weights;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DesignError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(DesignError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {v}"
                )))
            }
        };
        let positive = |name: &str, v: f64| -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(DesignError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {v}"
                )))
            }
        };

        unit("analyzer.interconnect_derating", self.analyzer.interconnect_derating)?;
        if self.analyzer.cache_capacity == 0 {
            return Err(DesignError::InvalidConfig(
                "analyzer.cache_capacity must be at least 1".to_string(),
            ));
        }

        let q = &self.quality;
        positive("quality.risk_threshold", q.risk_threshold)?;
        unit("quality.risk_threshold", q.risk_threshold)?;
        unit("quality.acceptance_threshold", q.acceptance_threshold)?;
        unit("quality.critical_severity", q.critical_severity)?;
        unit("quality.congestion_penalty", q.congestion_penalty)?;
        unit("quality.redundancy_step", q.redundancy_step)?;
        unit("quality.redundancy_cap", q.redundancy_cap)?;

        let o = &self.optimizer;
        if o.max_iterations == 0 {
            return Err(DesignError::InvalidConfig(
                "optimizer.max_iterations must be at least 1".to_string(),
            ));
        }
        if o.stall_limit == 0 {
            return Err(DesignError::InvalidConfig(
                "optimizer.stall_limit must be at least 1".to_string(),
            ));
        }
        if !(o.epsilon.is_finite() && o.epsilon >= 0.0) {
            return Err(DesignError::InvalidConfig(format!(
                "optimizer.epsilon must be finite and non-negative, got {}",
                o.epsilon
            )));
        }
        positive("optimizer.utilization_step", o.utilization_step)?;
        unit("optimizer.min_utilization", o.min_utilization)?;
        positive("optimizer.frequency_step_ghz", o.frequency_step_ghz)?;
        positive("optimizer.max_frequency_ghz", o.max_frequency_ghz)?;
        positive("optimizer.link_cost", o.link_cost)?;
        if !(o.capacity_growth.is_finite() && o.capacity_growth > 1.0) {
            return Err(DesignError::InvalidConfig(format!(
                "optimizer.capacity_growth must be greater than 1, got {}",
                o.capacity_growth
            )));
        }

        let g = &self.generator;
        positive("generator.default_utilization", g.default_utilization)?;
        unit("generator.default_utilization", g.default_utilization)?;
        unit("generator.max_headroom", g.max_headroom)?;
        positive("generator.default_capacity", g.default_capacity)?;
        let c = &g.processor_cost;
        for (name, v) in [
            ("generator.processor_cost.static_power_w", c.static_power_w),
            ("generator.processor_cost.dynamic_power_w", c.dynamic_power_w),
            ("generator.processor_cost.base_area_mm2", c.base_area_mm2),
            ("generator.processor_cost.core_area_mm2", c.core_area_mm2),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(DesignError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {v}"
                )));
            }
        }

        self.lifecycle.stages.ensure_reachable(stage::DESIGN)
    }
}
