//! Combined submission handling
//!
//! One decoded submission can carry both an activity batch and a usage
//! batch (the shape the front-end posts). Routing both through a single
//! helper keeps every entry point — HTTP glue, CLI — on the same
//! coercion and skip rules.

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::UsageDelta;
use serde::Deserialize;

/// A decoded submission payload.
///
/// Field aliases match the JSON keys the original front-end posts.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SubmissionBatch {
    /// Positional activity rows (5-field canonical or 4-field legacy)
    #[serde(default, alias = "activityData")]
    pub activity: Vec<Vec<String>>,
    /// Positional usage rows `[volunteer, used_points, course_count]`
    #[serde(default, alias = "usageData")]
    pub usage: Vec<Vec<String>>,
}

/// What a submission ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Activity rows stored
    pub activity_inserted: usize,
    /// Usage rows merged
    pub usage_merged: usize,
}

/// Apply one submission batch to the store.
///
/// Activity rows insert first so that usage merges in the same batch see
/// the new scores in their recomputed totals. Malformed usage rows are
/// skipped row-wise, mirroring activity row handling.
pub fn submit_batch(store: &dyn RecordStore, batch: &SubmissionBatch) -> Result<SubmitOutcome> {
    let activity_inserted = if batch.activity.is_empty() {
        0
    } else {
        store.insert_activity_rows(&batch.activity)?
    };

    let mut usage_merged = 0;
    for (index, row) in batch.usage.iter().enumerate() {
        match UsageDelta::from_row(row) {
            Some(delta) => {
                store.upsert_usage(&delta.volunteer, delta.used_points, delta.course_count)?;
                usage_merged += 1;
            }
            None => {
                tracing::warn!(index, fields = row.len(), "skipping malformed usage row");
            }
        }
    }

    tracing::debug!(activity_inserted, usage_merged, "submission applied");
    Ok(SubmitOutcome {
        activity_inserted,
        usage_merged,
    })
}
