//! Domain models for ChipForge.
//!
//! Canonical definitions for the core entities:
//! - `Requirements`: immutable input of a design session
//! - `ArchitectureSnapshot`: versioned, content-addressed candidate design
//! - `AnalysisResult` / `QualityReport`: scores and risk assessment of one snapshot
//! - `StageEntry` / `LifecycleHistory`: append-only chip lifecycle

pub mod analysis;
pub mod architecture;
pub mod error;
pub mod lifecycle;
pub mod quality;
pub mod requirements;

// Re-export main types and errors
pub use analysis::{AnalysisResult, Dimension, DimensionScores, ScoreWeights};
pub use architecture::{
    ArchitectureSnapshot, Component, ComponentKind, ConnectivityGraph, Link, PowerVariant,
    ResourceCost, SnapshotId,
};
pub use error::{DesignError, Result};
pub use lifecycle::{stage, LifecycleHistory, StageEntry, StagePayload, StagePlan};
pub use quality::{FailureCategory, FailureMode, QualityReport, Verdict};
pub use requirements::{PerformanceTarget, Requirements};
