//! Networked PostgreSQL storage backend
//!
//! Connections come from a bounded r2d2 pool; checkout and direct
//! connects are retried under the configured [`RetryPolicy`]. When the
//! pool could not be built at startup (server down, bad credentials),
//! the store falls back to one-off direct connections behind the same
//! handle type, so callers see a single acquire/release contract either
//! way. The usage merge is a single atomic insert-or-update statement,
//! so concurrent merges for one volunteer cannot lose updates.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::{ActivityKind, ActivityRecord, TotalRow, TotalsOrder, UsageRecord};
use postgres::{Client, NoTls};
use r2d2_postgres::PostgresConnectionManager;
use std::time::Duration;

use super::{schema, RecordStore};

type PgPool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

/// Scoped handle over either a pooled checkout or a direct connection.
///
/// Dropping it returns the connection to the pool or closes it; release
/// happens on every exit path.
enum PgHandle {
    Pooled(r2d2::PooledConnection<PostgresConnectionManager<NoTls>>),
    Direct(Client),
}

impl PgHandle {
    fn client(&mut self) -> &mut Client {
        match self {
            PgHandle::Pooled(conn) => &mut **conn,
            PgHandle::Direct(client) => client,
        }
    }
}

/// Pooled PostgreSQL store.
pub struct PostgresStore {
    url: String,
    pool: Option<PgPool>,
    retry: RetryPolicy,
}

impl PostgresStore {
    /// Connect to the database at `url`, build the bounded pool, and
    /// ensure the schema is current.
    pub fn open(url: &str, pool_min: u32, pool_max: u32, retry: RetryPolicy) -> Result<Self> {
        let pg_config: postgres::Config = url
            .parse()
            .map_err(|e: postgres::Error| Error::Config(format!("invalid database url: {}", e)))?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);

        let pool = match r2d2::Pool::builder()
            .min_idle(Some(pool_min))
            .max_size(pool_max.max(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
        {
            Ok(pool) => {
                tracing::info!(pool_min, pool_max, "connection pool created");
                Some(pool)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "connection pool unavailable, falling back to direct connections"
                );
                None
            }
        };

        let store = PostgresStore {
            url: url.to_string(),
            pool,
            retry,
        };

        let mut handle = store.acquire()?;
        schema::ensure_postgres(handle.client())?;
        Ok(store)
    }

    /// Acquire a scoped handle, retrying under the configured policy.
    fn acquire(&self) -> Result<PgHandle> {
        self.retry.run("storage handle acquisition", || {
            match &self.pool {
                Some(pool) => Ok(PgHandle::Pooled(pool.get()?)),
                None => Ok(PgHandle::Direct(Client::connect(&self.url, NoTls)?)),
            }
        })
    }

    fn row_to_usage(row: &postgres::Row) -> UsageRecord {
        UsageRecord {
            volunteer: row.get("volunteer_name"),
            total_points: row.get("total_points"),
            used_points: row.get("used_points"),
            course_count: row.get("course_count"),
        }
    }
}

impl RecordStore for PostgresStore {
    fn insert_activity_rows(&self, rows: &[Vec<String>]) -> Result<usize> {
        let mut handle = self.acquire()?;
        let mut tx = handle.client().transaction()?;
        let stmt = tx.prepare(
            "INSERT INTO activity_records \
                 (activity_type, activity_label, category, volunteer_name, score) \
             VALUES ($1, $2, $3, $4, $5)",
        )?;

        let mut inserted = 0;
        for (index, row) in rows.iter().enumerate() {
            match ActivityRecord::from_row(row) {
                Some(record) => {
                    let kind = record.kind.as_str();
                    tx.execute(
                        &stmt,
                        &[
                            &kind,
                            &record.label,
                            &record.category,
                            &record.volunteer,
                            &record.score,
                        ],
                    )?;
                    inserted += 1;
                }
                None => {
                    tracing::warn!(index, fields = row.len(), "skipping malformed activity row");
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

        let mut handle = self.acquire()?;
        let row = handle.client().query_one(
            "INSERT INTO usage_records (volunteer_name, total_points, used_points, course_count) \
             VALUES ($1, \
                     (SELECT COALESCE(SUM(score), 0)::bigint \
                        FROM activity_records WHERE volunteer_name = $1), \
                     $2, $3) \
             ON CONFLICT (volunteer_name) DO UPDATE SET \
                 total_points = (SELECT COALESCE(SUM(score), 0)::bigint \
                                   FROM activity_records WHERE volunteer_name = $1), \
                 used_points = usage_records.used_points + EXCLUDED.used_points, \
                 course_count = usage_records.course_count + EXCLUDED.course_count \
             RETURNING volunteer_name, total_points, used_points, course_count",
            &[
                &volunteer,
                &used_points_delta.max(0),
                &course_count_delta.max(0),
            ],
        )?;
        Ok(Self::row_to_usage(&row))
    }

    fn activity_totals(&self, order: TotalsOrder) -> Result<Vec<TotalRow>> {
        let mut handle = self.acquire()?;
        let sql = match order {
            TotalsOrder::NameAsc => {
                "SELECT volunteer_name, COALESCE(SUM(score), 0)::bigint AS total_score \
                 FROM activity_records GROUP BY volunteer_name ORDER BY volunteer_name"
            }
            TotalsOrder::ScoreDesc => {
                "SELECT volunteer_name, COALESCE(SUM(score), 0)::bigint AS total_score \
                 FROM activity_records GROUP BY volunteer_name \
                 ORDER BY total_score DESC, volunteer_name"
            }
        };
        let rows = handle.client().query(sql, &[])?;
        Ok(rows
            .iter()
            .map(|row| TotalRow {
                volunteer: row.get(0),
                total_score: row.get(1),
            })
            .collect())
    }

    fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let mut handle = self.acquire()?;
        let rows = handle.client().query(
            "SELECT volunteer_name, total_points, used_points, course_count \
             FROM usage_records ORDER BY volunteer_name",
            &[],
        )?;
        Ok(rows.iter().map(Self::row_to_usage).collect())
    }

    fn list_activity(&self) -> Result<Vec<ActivityRecord>> {
        let mut handle = self.acquire()?;
        let rows = handle.client().query(
            "SELECT activity_type, activity_label, category, volunteer_name, score \
             FROM activity_records ORDER BY id",
            &[],
        )?;
        Ok(rows
            .iter()
            .map(|row| {
                let kind: String = row.get(0);
                ActivityRecord {
                    kind: ActivityKind::coerce(&kind),
                    label: row.get(1),
                    category: row.get(2),
                    volunteer: row.get(3),
                    score: row.get(4),
                }
            })
            .collect())
    }

    fn health_check(&self) -> Result<()> {
        let mut handle = self.acquire()?;
        handle.client().query_one("SELECT 1", &[])?;
        Ok(())
    }
}
