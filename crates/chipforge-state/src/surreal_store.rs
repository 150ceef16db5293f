//! SurrealDB-backed LifecycleStore implementation
//!
//! Uses `schema::ChipRow`, `schema::StageEntryRow` and `schema::KvRow` for
//! persistence, converting to/from `storage_traits` types at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{ChipRow, KvRow, StageEntryRow};
use crate::storage_traits::{ChipRecord, LifecycleStore, StorageResult, StoredEntry};

const DEFAULT_NAMESPACE: &str = "chipforge";
const DEFAULT_DATABASE: &str = "main";

/// Connection settings for a remote SurrealDB instance
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL (e.g. "wss://xxx.surrealdb.cloud" or "surrealkv://path")
    pub endpoint: String,
    /// Credentials; `None` connects without signing in
    pub credentials: Option<(String, String)>,
    /// Namespace (default: "chipforge")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether the credentials belong to a root user
    pub is_root: bool,
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self.is_root = is_root;
        self
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - CHIPFORGE_DB_URL (required)
    /// - CHIPFORGE_DB_USERNAME / CHIPFORGE_DB_PASSWORD (optional, both or neither)
    /// - CHIPFORGE_DB_NAMESPACE (optional, default: "chipforge")
    /// - CHIPFORGE_DB_DATABASE (optional, default: "main")
    /// - CHIPFORGE_DB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint = std::env::var("CHIPFORGE_DB_URL").map_err(|_| "CHIPFORGE_DB_URL not set")?;
        let mut config = Self::new(endpoint);

        if let (Ok(user), Ok(pass)) = (
            std::env::var("CHIPFORGE_DB_USERNAME"),
            std::env::var("CHIPFORGE_DB_PASSWORD"),
        ) {
            let is_root = std::env::var("CHIPFORGE_DB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            config = config.with_credentials(user, pass, is_root);
        }
        if let Ok(ns) = std::env::var("CHIPFORGE_DB_NAMESPACE") {
            config.namespace = ns;
        }
        if let Ok(db) = std::env::var("CHIPFORGE_DB_DATABASE") {
            config.database = db;
        }
        Ok(config)
    }
}

/// SurrealDB-backed implementation of [`LifecycleStore`].
pub struct SurrealLifecycleStore {
    db: Surreal<Any>,
}

impl SurrealLifecycleStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `chipforge/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(StoreConfig::new("mem://")).await
    }

    /// Connect using explicit settings and initialize the schema.
    pub async fn connect(config: StoreConfig) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let Some((username, password)) = &config.credentials {
            if config.is_root {
                db.signin(Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!(endpoint = %config.endpoint, "SurrealLifecycleStore connected");
        Ok(Self { db })
    }

    /// Connect from environment variables (see [`StoreConfig::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        let config = StoreConfig::from_env().map_err(StateError::Connection)?;
        Self::connect(config).await
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_chip(&self, chip_id: &str) -> StorageResult<Option<ChipRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM chips WHERE chip_id = $cid")
            .bind(("cid", chip_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<ChipRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn require_chip(&self, chip_id: &str) -> StorageResult<ChipRow> {
        self.fetch_chip(chip_id)
            .await?
            .ok_or_else(|| StorageError::ChipNotFound {
                chip_id: chip_id.to_string(),
            })
    }

    async fn fetch_entries(&self, chip_id: &str) -> StorageResult<Vec<StageEntryRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM stage_entries WHERE chip_id = $cid ORDER BY seq ASC")
            .bind(("cid", chip_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        res.take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn entry_row(chip_id: &str, entry: StoredEntry) -> StageEntryRow {
        StageEntryRow {
            id: None,
            chip_id: chip_id.to_string(),
            seq: entry.seq,
            stage: entry.stage,
            payload: entry.payload,
            timestamp: entry.timestamp,
        }
    }

    async fn insert_entry(&self, chip_id: &str, entry: StoredEntry) -> StorageResult<()> {
        let _created: Option<StageEntryRow> = self
            .db
            .create("stage_entries")
            .content(Self::entry_row(chip_id, entry))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    /// A write rejected by the unique `chip_id` index on `chips`.
    fn is_duplicate_chip(msg: &str) -> bool {
        msg.contains("idx_chip_id") && msg.contains("already contains")
    }

    fn is_unique_violation(err: &StorageError) -> bool {
        matches!(err, StorageError::Backend(msg) if msg.contains("already contains"))
    }

    fn row_to_entry(row: StageEntryRow) -> StoredEntry {
        StoredEntry {
            seq: row.seq,
            stage: row.stage,
            payload: row.payload,
            timestamp: row.timestamp,
        }
    }
}

#[async_trait]
impl LifecycleStore for SurrealLifecycleStore {
    async fn create_record(
        &self,
        chip_id: &str,
        project_id: &str,
        first: StoredEntry,
    ) -> StorageResult<ChipRecord> {
        debug!(chip_id = %chip_id, "creating lifecycle record");
        let chip = ChipRow::new(chip_id.to_string(), project_id.to_string());
        let created_at = chip.created_at;
        let entry = Self::entry_row(chip_id, StoredEntry { seq: 0, ..first });

        // chip row and entry 0 commit together or not at all
        let mut response = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE chips CONTENT $chip; \
                 CREATE stage_entries CONTENT $entry; \
                 COMMIT TRANSACTION;",
            )
            .bind(("chip", chip))
            .bind(("entry", entry))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut errors: Vec<(usize, String)> = response
            .take_errors()
            .into_iter()
            .map(|(idx, e)| (idx, e.to_string()))
            .collect();
        if errors.iter().any(|(_, msg)| Self::is_duplicate_chip(msg)) {
            return Err(StorageError::DuplicateChip {
                chip_id: chip_id.to_string(),
            });
        }
        errors.sort_by_key(|(idx, _)| *idx);
        if let Some((_, msg)) = errors.into_iter().next() {
            return Err(StorageError::Backend(msg));
        }

        Ok(ChipRecord {
            chip_id: chip_id.to_string(),
            project_id: project_id.to_string(),
            entry_count: 1,
            created_at,
        })
    }

    async fn append_entry(
        &self,
        chip_id: &str,
        expected_seq: u64,
        entry: StoredEntry,
    ) -> StorageResult<()> {
        self.require_chip(chip_id).await?;
        let actual = self.fetch_entries(chip_id).await?.len() as u64;
        if actual != expected_seq {
            return Err(StorageError::SequenceConflict {
                chip_id: chip_id.to_string(),
                expected: expected_seq,
                actual,
            });
        }

        // The unique (chip_id, seq) index settles races between the count
        // check above and the insert.
        match self
            .insert_entry(
                chip_id,
                StoredEntry {
                    seq: expected_seq,
                    ..entry
                },
            )
            .await
        {
            Err(e) if Self::is_unique_violation(&e) => Err(StorageError::SequenceConflict {
                chip_id: chip_id.to_string(),
                expected: expected_seq,
                actual: expected_seq + 1,
            }),
            other => other,
        }
    }

    async fn get_record(&self, chip_id: &str) -> StorageResult<ChipRecord> {
        let row = self.require_chip(chip_id).await?;
        let entry_count = self.fetch_entries(chip_id).await?.len() as u64;
        Ok(ChipRecord {
            chip_id: row.chip_id,
            project_id: row.project_id,
            entry_count,
            created_at: row.created_at,
        })
    }

    async fn get_entries(&self, chip_id: &str) -> StorageResult<Vec<StoredEntry>> {
        self.require_chip(chip_id).await?;
        let rows = self.fetch_entries(chip_id).await?;
        Ok(rows.into_iter().map(Self::row_to_entry).collect())
    }

    async fn list_chips(&self) -> StorageResult<Vec<String>> {
        let mut res = self
            .db
            .query("SELECT * FROM chips ORDER BY chip_id ASC")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<ChipRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|r| r.chip_id).collect())
    }

    async fn put_value(&self, key: &str, value: serde_json::Value) -> StorageResult<()> {
        let row = KvRow {
            id: None,
            key: key.to_string(),
            value,
        };
        self.db
            .query("DELETE kv WHERE key = $key; CREATE kv CONTENT $row;")
            .bind(("key", key.to_string()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let mut res = self
            .db
            .query("SELECT * FROM kv WHERE key = $key")
            .bind(("key", key.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let rows: Vec<KvRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.into_iter().next().map(|r| r.value))
    }
}
