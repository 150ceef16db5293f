//! ChipForge State: lifecycle persistence for the design pipeline
//!
//! This crate owns every byte the pipeline keeps beyond a single
//! optimization session: the per-chip, append-only stage ledger and a small
//! key/value area for requirements and session state.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append-only integrity and atomic sequence-checked appends.
//!
//! ## Key Components
//!
//! - `LifecycleStore`: backend-agnostic async storage contract
//! - `MemoryLifecycleStore`: in-memory backend (tests, ephemeral CLI runs)
//! - `SurrealLifecycleStore`: SurrealDB backend with unique `(chip_id, seq)` index

mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use fakes::MemoryLifecycleStore;
pub use storage_traits::{
    ChipRecord, ContentDigest, LifecycleStore, StorageResult, StoredEntry,
};
pub use surreal_store::{StoreConfig, SurrealLifecycleStore};

/// Result type for chipforge-state backend setup
pub type Result<T> = std::result::Result<T, StateError>;
