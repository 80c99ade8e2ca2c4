//! Core domain types for pointledger
//!
//! Two entities make up the data model:
//!
//! | Term | Definition |
//! |------|------------|
//! | **ActivityRecord** | One submitted unit of volunteer participation with a point score |
//! | **UsageRecord** | Per-volunteer aggregate of redeemed points and redeemed courses |
//!
//! Activity records form an additive log: they are never updated in place.
//! Usage records are keyed by volunteer name and merge by addition; their
//! `total_points` is always recomputed from the activity log, never carried
//! forward as a running total.
//!
//! Submissions arrive as positional rows of strings (the shape the HTTP and
//! CLI layers decode). Row parsing lives here so every backend coerces input
//! the same way: non-numeric scores become 0, negative scores clamp to 0,
//! and the legacy 4-field row shape defaults to the on-site classification.

use serde::{Deserialize, Serialize};

// ============================================
// Activity classification
// ============================================

/// How an activity was held.
///
/// Legacy submissions used the two-value encoding `offline`/`online`;
/// these map onto the canonical display labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    /// In-person activity
    OnSite,
    /// Streamed activity
    Livestream,
}

impl ActivityKind {
    /// Returns the canonical label stored in the database and shown in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::OnSite => "on-site",
            ActivityKind::Livestream => "livestream",
        }
    }

    /// Lenient parse used for submitted rows and legacy stored values.
    ///
    /// Unrecognized values fall back to [`ActivityKind::OnSite`], the same
    /// default applied to 4-field legacy rows.
    pub fn coerce(s: &str) -> Self {
        s.parse().unwrap_or(ActivityKind::OnSite)
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "on-site" | "offline" => Ok(ActivityKind::OnSite),
            "livestream" | "online" => Ok(ActivityKind::Livestream),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

// ============================================
// Activity records
// ============================================

/// One submitted unit of volunteer participation.
///
/// Immutable once stored; duplicates are legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Classification of the activity
    pub kind: ActivityKind,
    /// Time-and-name composite label (e.g. "2024-01-01 meetup")
    pub label: String,
    /// Activity category
    pub category: String,
    /// Volunteer the points belong to
    pub volunteer: String,
    /// Point score, non-negative
    pub score: i64,
}

impl ActivityRecord {
    /// Parse a submitted positional row.
    ///
    /// Accepts the canonical 5-field shape
    /// `[kind, label, category, volunteer, score]` and the legacy 4-field
    /// shape `[label, category, volunteer, score]` (kind defaults to
    /// on-site). Any other arity, or an empty volunteer name, rejects the
    /// row; callers skip it and keep the rest of the batch.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let record = match row {
            [kind, label, category, volunteer, score] => ActivityRecord {
                kind: ActivityKind::coerce(kind),
                label: label.clone(),
                category: category.clone(),
                volunteer: volunteer.trim().to_string(),
                score: coerce_score(score),
            },
            [label, category, volunteer, score] => ActivityRecord {
                kind: ActivityKind::OnSite,
                label: label.clone(),
                category: category.clone(),
                volunteer: volunteer.trim().to_string(),
                score: coerce_score(score),
            },
            _ => return None,
        };

        if record.volunteer.is_empty() {
            return None;
        }
        Some(record)
    }
}

/// Coerce a submitted numeric field.
///
/// Non-numeric input becomes 0 rather than failing the batch; negative
/// values clamp to 0 to keep scores non-negative.
pub fn coerce_score(s: &str) -> i64 {
    s.trim().parse::<i64>().map(|v| v.max(0)).unwrap_or(0)
}

// ============================================
// Usage records
// ============================================

/// Per-volunteer aggregate of redeemed points and courses.
///
/// `total_points` is derived: it always equals the sum of the volunteer's
/// activity scores at the time of the last merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique aggregation key
    pub volunteer: String,
    /// Sum of the volunteer's activity scores, recomputed at merge time
    pub total_points: i64,
    /// Redeemed points, merged by addition
    pub used_points: i64,
    /// Redeemed course count, merged by addition
    pub course_count: i64,
}

/// A parsed usage submission row: the deltas to merge for one volunteer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDelta {
    /// Volunteer to merge into
    pub volunteer: String,
    /// Points redeemed in this submission
    pub used_points: i64,
    /// Courses redeemed in this submission
    pub course_count: i64,
}

impl UsageDelta {
    /// Parse a submitted `[volunteer, used_points, course_count]` row.
    ///
    /// Numeric fields coerce like activity scores. Rows with any other
    /// arity or an empty volunteer name are rejected.
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [volunteer, used, courses] => {
                let volunteer = volunteer.trim().to_string();
                if volunteer.is_empty() {
                    return None;
                }
                Some(UsageDelta {
                    volunteer,
                    used_points: coerce_score(used),
                    course_count: coerce_score(courses),
                })
            }
            _ => None,
        }
    }
}

// ============================================
// Aggregation output
// ============================================

/// One row of the per-volunteer totals aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalRow {
    /// Volunteer name
    pub volunteer: String,
    /// Sum of the volunteer's activity scores
    pub total_score: i64,
}

/// Ordering of the totals aggregation.
///
/// Name order feeds the summary views; score order feeds the
/// ranked export. Ties under score order break by name so output
/// is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsOrder {
    /// Ascending by volunteer name
    NameAsc,
    /// Descending by total score, ties by name ascending
    ScoreDesc,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kind_canonical_labels() {
        assert_eq!(ActivityKind::OnSite.as_str(), "on-site");
        assert_eq!(ActivityKind::Livestream.as_str(), "livestream");
    }

    #[test]
    fn test_kind_legacy_aliases() {
        assert_eq!(ActivityKind::coerce("offline"), ActivityKind::OnSite);
        assert_eq!(ActivityKind::coerce("online"), ActivityKind::Livestream);
        assert_eq!(ActivityKind::coerce("livestream"), ActivityKind::Livestream);
    }

    #[test]
    fn test_kind_unknown_defaults_to_on_site() {
        assert_eq!(ActivityKind::coerce("hybrid"), ActivityKind::OnSite);
        assert!("hybrid".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn test_from_row_canonical() {
        let record =
            ActivityRecord::from_row(&row(&["livestream", "2024-01-02 stream", "poster", "Alice", "5"]))
                .unwrap();
        assert_eq!(record.kind, ActivityKind::Livestream);
        assert_eq!(record.label, "2024-01-02 stream");
        assert_eq!(record.volunteer, "Alice");
        assert_eq!(record.score, 5);
    }

    #[test]
    fn test_from_row_legacy_defaults_on_site() {
        let record =
            ActivityRecord::from_row(&row(&["2024-01-01 meetup", "outreach", "Alice", "10"])).unwrap();
        assert_eq!(record.kind, ActivityKind::OnSite);
        assert_eq!(record.score, 10);
    }

    #[test]
    fn test_from_row_rejects_bad_arity() {
        assert!(ActivityRecord::from_row(&row(&["a", "b", "c"])).is_none());
        assert!(ActivityRecord::from_row(&row(&["a", "b", "c", "d", "e", "f"])).is_none());
        assert!(ActivityRecord::from_row(&[]).is_none());
    }

    #[test]
    fn test_from_row_rejects_empty_name() {
        assert!(ActivityRecord::from_row(&row(&["on-site", "x", "y", "", "5"])).is_none());
        assert!(ActivityRecord::from_row(&row(&["on-site", "x", "y", "  ", "5"])).is_none());
    }

    #[test]
    fn test_score_coercion() {
        assert_eq!(coerce_score("12"), 12);
        assert_eq!(coerce_score(" 7 "), 7);
        assert_eq!(coerce_score("seven"), 0);
        assert_eq!(coerce_score(""), 0);
        assert_eq!(coerce_score("-3"), 0);
    }

    #[test]
    fn test_usage_delta_from_row() {
        let delta = UsageDelta::from_row(&row(&["Alice", "5", "1"])).unwrap();
        assert_eq!(delta.volunteer, "Alice");
        assert_eq!(delta.used_points, 5);
        assert_eq!(delta.course_count, 1);

        // Blank numerics coerce to 0 like the activity score
        let delta = UsageDelta::from_row(&row(&["Bob", "", "x"])).unwrap();
        assert_eq!(delta.used_points, 0);
        assert_eq!(delta.course_count, 0);

        assert!(UsageDelta::from_row(&row(&["", "5", "1"])).is_none());
        assert!(UsageDelta::from_row(&row(&["Alice", "5"])).is_none());
    }
}
