//! SurrealDB schema migrations and initialization
//!
//! Sets up the lifecycle tables with the indexes that back the
//! append-only guarantees of [`crate::storage_traits::LifecycleStore`].

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all ChipForge tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing ChipForge SurrealDB schema");

    init_chips_table(db).await?;
    init_stage_entries_table(db).await?;
    init_kv_table(db).await?;

    info!("ChipForge schema initialization complete");
    Ok(())
}

/// Initialize `chips` table
///
/// Schema:
/// ```text
/// TABLE chips {
///   chip_id:     STRING (unique)
///   project_id:  STRING (indexed)
///   created_at:  DATETIME
/// }
/// ```
async fn init_chips_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing chips table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS chips AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_chip_id ON TABLE chips COLUMNS chip_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_project_id ON TABLE chips COLUMNS project_id;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `stage_entries` table
///
/// Constraints:
/// - `(chip_id, seq)` is unique, so two writers racing on the same
///   expected sequence number cannot both append.
/// - Entries are immutable (no update/delete permissions).
async fn init_stage_entries_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing stage_entries table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS stage_entries AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_chip_seq ON TABLE stage_entries COLUMNS chip_id, seq UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_stage ON TABLE stage_entries COLUMNS stage;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `kv` table for requirements and session state
async fn init_kv_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing kv table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS kv SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_kv_key ON TABLE kv COLUMNS key UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}
