//! ChipForge Core Library
//!
//! The autonomous design loop: generate a candidate architecture, score it,
//! assess its reliability, improve it, and record every lifecycle stage.
//!
//! Control flow: [`Designer`] → [`Analyzer`] → [`QualityEvaluator`] → back to
//! the designer until a stop condition fires → [`LifecycleTracker`].
//! [`DesignPipeline`] wires the whole loop for one chip.

pub mod analyzer;
pub mod artifact;
pub mod config;
pub mod designer;
pub mod domain;
pub mod evaluator;
pub mod obs;
pub mod pipeline;
pub mod telemetry;
pub mod tracker;

pub use analyzer::Analyzer;
pub use artifact::{read_session_artifact, write_session_artifact};
pub use config::{PipelineConfig, CONFIG_ENV};
pub use designer::{
    Designer, IterationRecord, OptimizationSession, Perturbation, PerturbationAction,
    SessionOutcome, SessionPhase, TerminationReason,
};
pub use domain::{
    stage, AnalysisResult, ArchitectureSnapshot, Component, ComponentKind, ConnectivityGraph,
    DesignError, Dimension, DimensionScores, FailureCategory, FailureMode, LifecycleHistory, Link,
    PerformanceTarget, PowerVariant, QualityReport, Requirements, ResourceCost, Result,
    ScoreWeights, SnapshotId, StageEntry, StagePayload, StagePlan, Verdict,
};
pub use evaluator::QualityEvaluator;
pub use pipeline::{default_seed, DesignPipeline, DesignRequest, PipelineReport};
pub use tracker::LifecycleTracker;

pub use chipforge_state::{LifecycleStore, MemoryLifecycleStore, SurrealLifecycleStore};
