//! Contract tests for LifecycleStore.
//!
//! Every check runs against both the in-memory fake and the SurrealDB
//! backend (`mem://`). Any conforming implementation must pass these.

use chipforge_state::fakes::MemoryLifecycleStore;
use chipforge_state::storage_traits::*;
use chipforge_state::{StorageError, SurrealLifecycleStore};

fn entry(stage: &str) -> StoredEntry {
    StoredEntry::new(0, stage, serde_json::json!({ "stage": stage }))
}

// ===========================================================================
// Shared contract checks
// ===========================================================================

async fn check_create_then_read(store: &dyn LifecycleStore) {
    let record = store
        .create_record("c1", "proj", entry("REGISTERED"))
        .await
        .unwrap();
    assert_eq!(record.chip_id, "c1");
    assert_eq!(record.project_id, "proj");
    assert_eq!(record.entry_count, 1);

    let entries = store.get_entries("c1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 0);
    assert_eq!(entries[0].stage, "REGISTERED");
    assert_eq!(entries[0].payload["stage"], "REGISTERED");
}

async fn check_duplicate_create_rejected(store: &dyn LifecycleStore) {
    store
        .create_record("dup", "proj", entry("REGISTERED"))
        .await
        .unwrap();
    let err = store
        .create_record("dup", "proj", entry("REGISTERED"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateChip { ref chip_id } if chip_id == "dup"));
    assert_eq!(store.get_entries("dup").await.unwrap().len(), 1);
}

async fn check_append_orders_by_seq(store: &dyn LifecycleStore) {
    store
        .create_record("ord", "proj", entry("REGISTERED"))
        .await
        .unwrap();
    store.append_entry("ord", 1, entry("DESIGN")).await.unwrap();
    store
        .append_entry("ord", 2, entry("VERIFICATION"))
        .await
        .unwrap();

    let stages: Vec<String> = store
        .get_entries("ord")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.stage)
        .collect();
    assert_eq!(stages, vec!["REGISTERED", "DESIGN", "VERIFICATION"]);
    assert_eq!(store.get_record("ord").await.unwrap().entry_count, 3);
}

async fn check_stale_seq_conflicts(store: &dyn LifecycleStore) {
    store
        .create_record("stale", "proj", entry("REGISTERED"))
        .await
        .unwrap();
    store.append_entry("stale", 1, entry("DESIGN")).await.unwrap();

    let err = store
        .append_entry("stale", 1, entry("VERIFICATION"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::SequenceConflict { expected: 1, .. }
    ));
    assert_eq!(store.get_entries("stale").await.unwrap().len(), 2);
}

async fn check_unknown_chip(store: &dyn LifecycleStore) {
    let err = store.get_record("ghost").await.unwrap_err();
    assert!(matches!(err, StorageError::ChipNotFound { .. }));

    let err = store.get_entries("ghost").await.unwrap_err();
    assert!(matches!(err, StorageError::ChipNotFound { .. }));

    let err = store
        .append_entry("ghost", 1, entry("DESIGN"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ChipNotFound { .. }));
}

async fn check_list_chips_sorted(store: &dyn LifecycleStore) {
    for id in ["zeta", "alpha", "mid"] {
        store
            .create_record(id, "proj", entry("REGISTERED"))
            .await
            .unwrap();
    }
    assert_eq!(
        store.list_chips().await.unwrap(),
        vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
    );
}

async fn check_kv_overwrite(store: &dyn LifecycleStore) {
    assert!(store.get_value("req:c1").await.unwrap().is_none());
    store
        .put_value("req:c1", serde_json::json!({"clock_ghz": 2.0}))
        .await
        .unwrap();
    store
        .put_value("req:c1", serde_json::json!({"clock_ghz": 2.5}))
        .await
        .unwrap();
    let value = store.get_value("req:c1").await.unwrap().unwrap();
    assert_eq!(value["clock_ghz"], 2.5);
}

// ===========================================================================
// MemoryLifecycleStore
// ===========================================================================

#[tokio::test]
async fn memory_create_then_read() {
    check_create_then_read(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_duplicate_create_rejected() {
    check_duplicate_create_rejected(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_append_orders_by_seq() {
    check_append_orders_by_seq(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_stale_seq_conflicts() {
    check_stale_seq_conflicts(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_unknown_chip() {
    check_unknown_chip(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_list_chips_sorted() {
    check_list_chips_sorted(&MemoryLifecycleStore::new()).await;
}

#[tokio::test]
async fn memory_kv_overwrite() {
    check_kv_overwrite(&MemoryLifecycleStore::new()).await;
}

// ===========================================================================
// SurrealLifecycleStore (mirrors the memory tests above)
// ===========================================================================

async fn surreal() -> SurrealLifecycleStore {
    SurrealLifecycleStore::in_memory()
        .await
        .expect("in_memory() failed")
}

#[tokio::test]
async fn surreal_create_then_read() {
    check_create_then_read(&surreal().await).await;
}

#[tokio::test]
async fn surreal_duplicate_create_rejected() {
    check_duplicate_create_rejected(&surreal().await).await;
}

#[tokio::test]
async fn surreal_append_orders_by_seq() {
    check_append_orders_by_seq(&surreal().await).await;
}

#[tokio::test]
async fn surreal_stale_seq_conflicts() {
    check_stale_seq_conflicts(&surreal().await).await;
}

#[tokio::test]
async fn surreal_unknown_chip() {
    check_unknown_chip(&surreal().await).await;
}

#[tokio::test]
async fn surreal_list_chips_sorted() {
    check_list_chips_sorted(&surreal().await).await;
}

#[tokio::test]
async fn surreal_kv_overwrite() {
    check_kv_overwrite(&surreal().await).await;
}
