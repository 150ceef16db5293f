//! Lifecycle tracker: append-only, strictly forward stage transitions.

use std::collections::HashMap;
use std::sync::Arc;

use chipforge_state::{LifecycleStore, StoredEntry};
use tokio::sync::Mutex;

use crate::domain::{
    DesignError, LifecycleHistory, Requirements, Result, StageEntry, StagePayload, StagePlan,
};
use crate::obs;

fn requirements_key(chip_id: &str) -> String {
    format!("requirements:{chip_id}")
}

/// Records every stage a chip passes through.
///
/// Same-chip operations are serialized by a per-chip async lock; the store's
/// sequence-checked append backs this up across processes. Different chips
/// never wait on each other. A chip's lock entry lives only while some
/// operation on that chip is in flight.
pub struct LifecycleTracker<S> {
    store: S,
    plan: StagePlan,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> LifecycleTracker<S>
where
    S: LifecycleStore,
{
    pub fn new(store: S) -> Self {
        Self::with_plan(store, StagePlan::standard())
    }

    pub fn with_plan(store: S, plan: StagePlan) -> Self {
        Self {
            store,
            plan,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn chip_lock(&self, chip_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(chip_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the chip's lock entry once the map holds the last other reference.
    async fn release_lock(&self, chip_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(chip_id);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Create the lifecycle record at the plan's first stage.
    pub async fn register(
        &self,
        chip_id: &str,
        project_id: &str,
        initial: StagePayload,
    ) -> Result<StageEntry> {
        let lock = self.chip_lock(chip_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.register_locked(chip_id, project_id, initial).await
        };
        self.release_lock(chip_id, lock).await;
        result
    }

    async fn register_locked(
        &self,
        chip_id: &str,
        project_id: &str,
        initial: StagePayload,
    ) -> Result<StageEntry> {
        let stage = self.plan.initial().to_string();
        let stored = StoredEntry::new(0, stage.clone(), serde_json::to_value(&initial)?);
        let timestamp = stored.timestamp;
        self.store.create_record(chip_id, project_id, stored).await?;
        obs::emit_stage_recorded(chip_id, &stage, 0);

        Ok(StageEntry {
            seq: 0,
            stage,
            timestamp,
            payload: initial,
        })
    }

    /// Append a transition to `target_stage`, which must lie strictly after
    /// the chip's current stage. Skipping forward is allowed.
    pub async fn advance(
        &self,
        chip_id: &str,
        target_stage: &str,
        data: StagePayload,
    ) -> Result<StageEntry> {
        let Some(target_pos) = self.plan.position(target_stage) else {
            return Err(DesignError::UnknownStage {
                chip_id: chip_id.to_string(),
                stage: target_stage.to_string(),
            });
        };

        let lock = self.chip_lock(chip_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.advance_locked(chip_id, target_stage, target_pos, data).await
        };
        self.release_lock(chip_id, lock).await;
        result
    }

    async fn advance_locked(
        &self,
        chip_id: &str,
        target_stage: &str,
        target_pos: usize,
        data: StagePayload,
    ) -> Result<StageEntry> {
        let entries = self.store.get_entries(chip_id).await?;
        let Some(current) = entries.last() else {
            return Err(DesignError::UnknownChip {
                chip_id: chip_id.to_string(),
            });
        };

        let forward = self
            .plan
            .position(&current.stage)
            .is_some_and(|current_pos| target_pos > current_pos);
        if !forward {
            obs::emit_transition_rejected(chip_id, &current.stage, target_stage);
            return Err(DesignError::InvalidTransition {
                chip_id: chip_id.to_string(),
                current: current.stage.clone(),
                target: target_stage.to_string(),
            });
        }

        let seq = entries.len() as u64;
        let stored = StoredEntry::new(seq, target_stage, serde_json::to_value(&data)?);
        let timestamp = stored.timestamp;
        self.store.append_entry(chip_id, seq, stored).await?;
        obs::emit_stage_recorded(chip_id, target_stage, seq);

        Ok(StageEntry {
            seq,
            stage: target_stage.to_string(),
            timestamp,
            payload: data,
        })
    }

    /// Latest stage entry.
    pub async fn status(&self, chip_id: &str) -> Result<StageEntry> {
        self.history(chip_id)
            .await?
            .latest()
            .cloned()
            .ok_or_else(|| DesignError::UnknownChip {
                chip_id: chip_id.to_string(),
            })
    }

    pub async fn history(&self, chip_id: &str) -> Result<LifecycleHistory> {
        let entries = self
            .store
            .get_entries(chip_id)
            .await?
            .into_iter()
            .map(StageEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(LifecycleHistory::new(chip_id, entries))
    }

    pub async fn list_chips(&self) -> Result<Vec<String>> {
        Ok(self.store.list_chips().await?)
    }

    /// Project the chip was registered under.
    pub async fn project_of(&self, chip_id: &str) -> Result<String> {
        Ok(self.store.get_record(chip_id).await?.project_id)
    }

    pub async fn save_requirements(&self, chip_id: &str, requirements: &Requirements) -> Result<()> {
        self.store
            .put_value(&requirements_key(chip_id), serde_json::to_value(requirements)?)
            .await?;
        Ok(())
    }

    pub async fn load_requirements(&self, chip_id: &str) -> Result<Option<Requirements>> {
        match self.store.get_value(&requirements_key(chip_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}
