//! In-memory fakes for storage traits
//!
//! Provides `MemoryLifecycleStore`, which satisfies the `LifecycleStore`
//! contract without any external dependencies. Used by tests and by the CLI
//! when no database is configured.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug)]
struct ChipState {
    record: ChipRecord,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    chips: BTreeMap<String, ChipState>,
    values: HashMap<String, serde_json::Value>,
}

/// In-memory lifecycle store backed by a `BTreeMap<chip_id, ChipState>`.
#[derive(Debug, Default)]
pub struct MemoryLifecycleStore {
    inner: Mutex<Inner>,
}

impl MemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Backend(format!("memory store poisoned: {e}")))
    }
}

#[async_trait]
impl LifecycleStore for MemoryLifecycleStore {
    async fn create_record(
        &self,
        chip_id: &str,
        project_id: &str,
        first: StoredEntry,
    ) -> StorageResult<ChipRecord> {
        let mut inner = self.lock()?;
        if inner.chips.contains_key(chip_id) {
            return Err(StorageError::DuplicateChip {
                chip_id: chip_id.to_string(),
            });
        }
        let record = ChipRecord {
            chip_id: chip_id.to_string(),
            project_id: project_id.to_string(),
            entry_count: 1,
            created_at: Utc::now(),
        };
        let first = StoredEntry { seq: 0, ..first };
        inner.chips.insert(
            chip_id.to_string(),
            ChipState {
                record: record.clone(),
                entries: vec![first],
            },
        );
        Ok(record)
    }

    async fn append_entry(
        &self,
        chip_id: &str,
        expected_seq: u64,
        entry: StoredEntry,
    ) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let state = inner
            .chips
            .get_mut(chip_id)
            .ok_or_else(|| StorageError::ChipNotFound {
                chip_id: chip_id.to_string(),
            })?;
        let actual = state.entries.len() as u64;
        if actual != expected_seq {
            return Err(StorageError::SequenceConflict {
                chip_id: chip_id.to_string(),
                expected: expected_seq,
                actual,
            });
        }
        state.entries.push(StoredEntry {
            seq: expected_seq,
            ..entry
        });
        state.record.entry_count = actual + 1;
        Ok(())
    }

    async fn get_record(&self, chip_id: &str) -> StorageResult<ChipRecord> {
        let inner = self.lock()?;
        inner
            .chips
            .get(chip_id)
            .map(|s| s.record.clone())
            .ok_or_else(|| StorageError::ChipNotFound {
                chip_id: chip_id.to_string(),
            })
    }

    async fn get_entries(&self, chip_id: &str) -> StorageResult<Vec<StoredEntry>> {
        let inner = self.lock()?;
        let state = inner
            .chips
            .get(chip_id)
            .ok_or_else(|| StorageError::ChipNotFound {
                chip_id: chip_id.to_string(),
            })?;
        Ok(state.entries.clone())
    }

    async fn list_chips(&self) -> StorageResult<Vec<String>> {
        let inner = self.lock()?;
        Ok(inner.chips.keys().cloned().collect())
    }

    async fn put_value(&self, key: &str, value: serde_json::Value) -> StorageResult<()> {
        let mut inner = self.lock()?;
        inner.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let inner = self.lock()?;
        Ok(inner.values.get(key).cloned())
    }
}
