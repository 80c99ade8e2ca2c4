//! In-process storage backend
//!
//! A process-lifetime store with no acquisition cost: the lock guard is
//! the scoped handle. Mutating operations hold the write lock across
//! their whole read-modify-write sequence, so concurrent usage merges
//! for the same volunteer cannot lose updates.

use crate::error::{Error, Result};
use crate::types::{ActivityRecord, TotalRow, TotalsOrder, UsageRecord};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::RecordStore;

#[derive(Debug, Default)]
struct MemoryInner {
    activity: Vec<ActivityRecord>,
    usage: BTreeMap<String, UsageRecord>,
}

impl MemoryInner {
    fn total_for(&self, volunteer: &str) -> i64 {
        self.activity
            .iter()
            .filter(|r| r.volunteer == volunteer)
            .map(|r| r.score)
            .sum()
    }
}

/// Process-wide in-memory store.
///
/// Constructed once at startup and shared by reference; contents live
/// exactly as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn insert_activity_rows(&self, rows: &[Vec<String>]) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        let mut inserted = 0;
        for (index, row) in rows.iter().enumerate() {
            match ActivityRecord::from_row(row) {
                Some(record) => {
                    inner.activity.push(record);
                    inserted += 1;
                }
                None => {
                    tracing::warn!(index, fields = row.len(), "skipping malformed activity row");
                }
            }
        }
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

        let mut inner = self.inner.write().unwrap();
        let total_points = inner.total_for(volunteer);
        let record = inner
            .usage
            .entry(volunteer.to_string())
            .or_insert_with(|| UsageRecord {
                volunteer: volunteer.to_string(),
                total_points: 0,
                used_points: 0,
                course_count: 0,
            });
        record.used_points += used_points_delta.max(0);
        record.course_count += course_count_delta.max(0);
        record.total_points = total_points;
        Ok(record.clone())
    }

    fn activity_totals(&self, order: TotalsOrder) -> Result<Vec<TotalRow>> {
        let inner = self.inner.read().unwrap();
        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        for record in &inner.activity {
            *totals.entry(record.volunteer.as_str()).or_insert(0) += record.score;
        }

        let mut rows: Vec<TotalRow> = totals
            .into_iter()
            .map(|(volunteer, total_score)| TotalRow {
                volunteer: volunteer.to_string(),
                total_score,
            })
            .collect();

        if order == TotalsOrder::ScoreDesc {
            rows.sort_by(|a, b| {
                b.total_score
                    .cmp(&a.total_score)
                    .then_with(|| a.volunteer.cmp(&b.volunteer))
            });
        }
        Ok(rows)
    }

    fn list_usage(&self) -> Result<Vec<UsageRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.usage.values().cloned().collect())
    }

    fn list_activity(&self) -> Result<Vec<ActivityRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.activity.clone())
    }

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
