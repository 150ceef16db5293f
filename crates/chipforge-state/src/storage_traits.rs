//! Storage trait definitions for ChipForge
//!
//! The pipeline core treats persistence as a capability:
//! - `ContentDigest`: SHA-256 content address used for snapshot identity
//! - `LifecycleStore`: per-chip append-only stage ledger plus a small
//!   key/value area for requirements and session state
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LifecycleStore
// ---------------------------------------------------------------------------

/// One persisted stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Position in the chip's ledger, starting at 0 for the registration entry
    pub seq: u64,
    /// Stage name as configured by the caller's stage plan
    pub stage: String,
    /// Payload supplied at the transition
    pub payload: serde_json::Value,
    /// When the transition was recorded
    pub timestamp: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(seq: u64, stage: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            seq,
            stage: stage.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Header of a chip's lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipRecord {
    pub chip_id: String,
    pub project_id: String,
    /// Number of entries appended so far (the next expected seq)
    pub entry_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Durable per-chip lifecycle ledger.
///
/// Guarantees:
/// - `create_record` is the only way to start a ledger; it stores entry 0.
/// - `append_entry` is atomic on `expected_seq`: the entry is stored only if
///   the ledger currently holds exactly `expected_seq` entries.
/// - Entries are never removed or rewritten.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Create the ledger for `chip_id` with its first entry.
    async fn create_record(
        &self,
        chip_id: &str,
        project_id: &str,
        first: StoredEntry,
    ) -> StorageResult<ChipRecord>;

    /// Append an entry. Fails with `SequenceConflict` if `expected_seq` is stale.
    async fn append_entry(
        &self,
        chip_id: &str,
        expected_seq: u64,
        entry: StoredEntry,
    ) -> StorageResult<()>;

    /// Retrieve the record header. Returns `ChipNotFound` if absent.
    async fn get_record(&self, chip_id: &str) -> StorageResult<ChipRecord>;

    /// Retrieve all entries for a chip, ordered by seq.
    async fn get_entries(&self, chip_id: &str) -> StorageResult<Vec<StoredEntry>>;

    /// List registered chip ids, sorted.
    async fn list_chips(&self) -> StorageResult<Vec<String>>;

    /// Set a value in the key/value area (overwrites).
    async fn put_value(&self, key: &str, value: serde_json::Value) -> StorageResult<()>;

    /// Get a value from the key/value area.
    async fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>>;
}

/// Shared stores (`Arc<dyn LifecycleStore>` included) forward to the inner store.
#[async_trait]
impl<S> LifecycleStore for std::sync::Arc<S>
where
    S: LifecycleStore + ?Sized,
{
    async fn create_record(
        &self,
        chip_id: &str,
        project_id: &str,
        first: StoredEntry,
    ) -> StorageResult<ChipRecord> {
        (**self).create_record(chip_id, project_id, first).await
    }

    async fn append_entry(
        &self,
        chip_id: &str,
        expected_seq: u64,
        entry: StoredEntry,
    ) -> StorageResult<()> {
        (**self).append_entry(chip_id, expected_seq, entry).await
    }

    async fn get_record(&self, chip_id: &str) -> StorageResult<ChipRecord> {
        (**self).get_record(chip_id).await
    }

    async fn get_entries(&self, chip_id: &str) -> StorageResult<Vec<StoredEntry>> {
        (**self).get_entries(chip_id).await
    }

    async fn list_chips(&self) -> StorageResult<Vec<String>> {
        (**self).list_chips().await
    }

    async fn put_value(&self, key: &str, value: serde_json::Value) -> StorageResult<()> {
        (**self).put_value(key, value).await
    }

    async fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        (**self).get_value(key).await
    }
}
