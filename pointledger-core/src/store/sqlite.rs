//! Embedded SQLite storage backend
//!
//! Each logical operation opens its own connection (the scoped handle)
//! and closes it on drop; SQLite's own locking arbitrates between
//! connections. The usage merge runs inside an IMMEDIATE transaction so
//! the total recompute and the write are one atomic step.

use crate::error::{Error, Result};
use crate::types::{ActivityKind, ActivityRecord, TotalRow, TotalsOrder, UsageRecord};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};

use super::{schema, RecordStore};

/// File-backed SQLite store.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at `path` and ensure the
    /// schema is current.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = SqliteStore {
            path: path.to_path_buf(),
        };
        let mut conn = store.connect()?;
        schema::ensure_sqlite(&mut conn)?;

        tracing::info!(path = %path.display(), "opened embedded store");
        Ok(store)
    }

    /// Open a fresh scoped connection for one logical operation.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(conn)
    }

    fn row_to_usage(row: &Row) -> rusqlite::Result<UsageRecord> {
        Ok(UsageRecord {
            volunteer: row.get("volunteer_name")?,
            total_points: row.get("total_points")?,
            used_points: row.get("used_points")?,
            course_count: row.get("course_count")?,
        })
    }
}

impl RecordStore for SqliteStore {
    fn insert_activity_rows(&self, rows: &[Vec<String>]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO activity_records \
                     (activity_type, activity_label, category, volunteer_name, score) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (index, row) in rows.iter().enumerate() {
                match ActivityRecord::from_row(row) {
                    Some(record) => {
                        stmt.execute(params![
                            record.kind.as_str(),
                            record.label,
                            record.category,
                            record.volunteer,
                            record.score,
                        ])?;
                        inserted += 1;
                    }
                    None => {
                        tracing::warn!(index, fields = row.len(), "skipping malformed activity row");
                    }
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn upsert_usage(
        &self,
        volunteer: &str,
        used_points_delta: i64,
        course_count_delta: i64,
    ) -> Result<UsageRecord> {
        let volunteer = volunteer.trim();
        if volunteer.is_empty() {
            return Err(Error::Repository(
                "volunteer name must not be empty".to_string(),
            ));
        }

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let total_points: i64 = tx.query_row(
            "SELECT COALESCE(SUM(score), 0) FROM activity_records WHERE volunteer_name = ?1",
            [volunteer],
            |r| r.get(0),
        )?;

        tx.execute(
            "INSERT INTO usage_records (volunteer_name, total_points, used_points, course_count) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(volunteer_name) DO UPDATE SET \
                 total_points = excluded.total_points, \
                 used_points = used_points + excluded.used_points, \
                 course_count = course_count + excluded.course_count",
            params![
                volunteer,
                total_points,
                used_points_delta.max(0),
                course_count_delta.max(0),
            ],
        )?;

        let record = tx.query_row(
            "SELECT volunteer_name, total_points, used_points, course_count \
             FROM usage_records WHERE volunteer_name = ?1",
            [volunteer],
            Self::row_to_usage,
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn activity_totals(&self, order: TotalsOrder) -> Result<Vec<TotalRow>> {
        let conn = self.connect()?;
        let sql = match order {
            TotalsOrder::NameAsc => {
                "SELECT volunteer_name, COALESCE(SUM(score), 0) AS total_score \
                 FROM activity_records GROUP BY volunteer_name ORDER BY volunteer_name"
            }
            TotalsOrder::ScoreDesc => {
                "SELECT volunteer_name, COALESCE(SUM(score), 0) AS total_score \
                 FROM activity_records GROUP BY volunteer_name \
                 ORDER BY total_score DESC, volunteer_name"
            }
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TotalRow {
                    volunteer: row.get(0)?,
                    total_score: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT volunteer_name, total_points, used_points, course_count \
             FROM usage_records ORDER BY volunteer_name",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_usage)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_activity(&self) -> Result<Vec<ActivityRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT activity_type, activity_label, category, volunteer_name, score \
             FROM activity_records ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                Ok(ActivityRecord {
                    kind: ActivityKind::coerce(&kind),
                    label: row.get(1)?,
                    category: row.get(2)?,
                    volunteer: row.get(3)?,
                    score: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn health_check(&self) -> Result<()> {
        let conn = self.connect()?;
        let _: i64 = conn
            .query_row("SELECT 1", [], |r| r.get(0))
            .optional()?
            .unwrap_or(0);
        Ok(())
    }
}
