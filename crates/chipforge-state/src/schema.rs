//! SurrealDB row types
//!
//! Rows are converted to/from `storage_traits` types at the backend boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Row in the `chips` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChipRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Chip identifier (unique)
    pub chip_id: String,
    /// Owning project
    pub project_id: String,
    /// Created timestamp
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ChipRow {
    pub fn new(chip_id: String, project_id: String) -> Self {
        ChipRow {
            id: None,
            chip_id,
            project_id,
            created_at: Utc::now(),
        }
    }
}

/// Row in the `stage_entries` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntryRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Chip this entry belongs to
    pub chip_id: String,
    /// Position in the chip ledger (0-indexed, unique per chip)
    pub seq: u64,
    /// Stage name
    pub stage: String,
    /// Stage payload (JSON)
    pub payload: serde_json::Value,
    /// Entry timestamp
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

/// Row in the `kv` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub key: String,
    pub value: serde_json::Value,
}
