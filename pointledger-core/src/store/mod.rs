//! Storage layer for pointledger
//!
//! One contract, three interchangeable backends:
//! - [`MemoryStore`] — process-wide in-memory store
//! - [`SqliteStore`] — embedded file-backed store
//! - [`PostgresStore`] — pooled networked store
//!
//! The backend is selected once from configuration by [`open_store`];
//! callers hold a `dyn RecordStore` and never branch on mode. Each
//! operation acquires a scoped handle internally and releases it on
//! every exit path.

pub mod memory;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::config::{StorageConfig, StorageMode};
use crate::error::{Error, Result};
use crate::types::{ActivityRecord, TotalRow, TotalsOrder, UsageRecord};

/// Uniform repository contract implemented by every backend.
///
/// All operations are atomic per the backend's native transaction
/// guarantee; row-level validation skips malformed rows without failing
/// the batch.
pub trait RecordStore: Send + Sync {
    /// Insert a batch of submitted activity rows, returning how many were
    /// stored.
    ///
    /// Accepts canonical 5-field and legacy 4-field rows; rows of any
    /// other arity (or with an empty volunteer name) are skipped
    /// individually while the rest of the batch commits. Insertion order
    /// is preserved and duplicates are legal.
    fn insert_activity_rows(&self, rows: &[Vec<String>]) -> Result<usize>;

    /// Merge a usage submission for one volunteer.
    ///
    /// Creates the record on first use, otherwise adds the deltas to
    /// `used_points`/`course_count`; `total_points` is recomputed from
    /// the activity log at merge time. Safe against concurrent merges
    /// for the same volunteer.
    fn upsert_usage(
        &self,
        volunteer: &str,
        used_points_delta: i64,
        course_count_delta: i64,
    ) -> Result<UsageRecord>;

    /// Per-volunteer activity score totals in the requested order.
    fn activity_totals(&self, order: TotalsOrder) -> Result<Vec<TotalRow>>;

    /// All usage records, ordered by volunteer name ascending.
    fn list_usage(&self) -> Result<Vec<UsageRecord>>;

    /// All activity records in insertion order (the raw-export feed).
    fn list_activity(&self) -> Result<Vec<ActivityRecord>>;

    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> Result<()>;
}

/// Open the store selected by `config`.
///
/// Validates the configuration, connects, and ensures the schema is
/// current before returning. For the networked mode an unreachable
/// server surfaces as [`Error::Unavailable`] once the retry budget is
/// spent.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn RecordStore>> {
    config.validate()?;

    match config.mode {
        StorageMode::Memory => {
            tracing::info!("opened in-memory store");
            Ok(Box::new(MemoryStore::new()))
        }
        StorageMode::Embedded => Ok(Box::new(SqliteStore::open(&config.database_path)?)),
        StorageMode::Networked => {
            let url = config.database_url.as_ref().ok_or_else(|| {
                Error::Config("storage.database_url is required for networked mode".to_string())
            })?;
            Ok(Box::new(PostgresStore::open(
                url,
                config.pool_min,
                config.pool_max,
                config.retry_policy(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigFile};

    #[test]
    fn test_open_store_memory() {
        let env = |key: &str| match key {
            "POINTLEDGER_STORAGE_MODE" => Some("memory".to_string()),
            _ => None,
        };
        let config = Config::resolve(ConfigFile::default(), env).unwrap();
        let store = open_store(&config.storage).unwrap();
        store.health_check().unwrap();
    }

    #[test]
    fn test_open_store_embedded() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("points.db");
        let env = |key: &str| match key {
            "POINTLEDGER_STORAGE_MODE" => Some("embedded".to_string()),
            "POINTLEDGER_DATABASE_PATH" => Some(db_path.to_string_lossy().to_string()),
            _ => None,
        };
        let config = Config::resolve(ConfigFile::default(), env).unwrap();
        let store = open_store(&config.storage).unwrap();
        store.health_check().unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_open_store_networked_requires_url() {
        let storage = crate::config::StorageConfig {
            mode: StorageMode::Networked,
            database_url: None,
            database_path: Config::database_path(),
            pool_min: 1,
            pool_max: 4,
            max_retries: 1,
            retry_delay_ms: 0,
        };
        assert!(matches!(open_store(&storage), Err(Error::Config(_))));
    }
}
