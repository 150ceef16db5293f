//! Domain-level error taxonomy for ChipForge.

use chipforge_state::StorageError;

/// ChipForge domain errors.
///
/// Every variant carries enough context (chip id, stage, offending value)
/// for the caller to correct the call.
#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("infeasible requirements: {reason} (power {min_power_w:.3} W vs ceiling {power_ceiling_w:.3} W, area {min_area_mm2:.3} mm² vs ceiling {area_ceiling_mm2:.3} mm²)")]
    InfeasibleRequirements {
        reason: String,
        min_power_w: f64,
        power_ceiling_w: f64,
        min_area_mm2: f64,
        area_ceiling_mm2: f64,
    },

    #[error("invalid requirements: {0}")]
    InvalidRequirements(String),

    #[error("invalid score weights: {reason} (sum = {sum})")]
    InvalidWeights { reason: String, sum: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid transition for chip {chip_id}: {current} -> {target}")]
    InvalidTransition {
        chip_id: String,
        current: String,
        target: String,
    },

    #[error("unknown chip: {chip_id}")]
    UnknownChip { chip_id: String },

    #[error("unknown stage {stage} for chip {chip_id}")]
    UnknownStage { chip_id: String, stage: String },

    #[error("chip already registered: {chip_id}")]
    DuplicateChip { chip_id: String },

    #[error("optimization session {session_id} cancelled before a candidate was produced")]
    SessionCancelled { session_id: String },

    #[error("design task failed: {0}")]
    TaskFailed(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for DesignError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ChipNotFound { chip_id } => DesignError::UnknownChip { chip_id },
            StorageError::DuplicateChip { chip_id } => DesignError::DuplicateChip { chip_id },
            other => DesignError::Storage(other.to_string()),
        }
    }
}

/// Result type for ChipForge domain operations.
pub type Result<T> = std::result::Result<T, DesignError>;
