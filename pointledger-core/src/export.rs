//! Spreadsheet export
//!
//! Renders repository output into the three CSV sheets the platform
//! offers for download: the raw activity log, the per-volunteer totals
//! summary, and the usage table. The repository guarantees row order and
//! types; this module only formats.

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::{TotalRow, TotalsOrder, UsageRecord};
use std::io::Write;

/// Write the raw activity log, in insertion order.
pub fn write_activity_csv<W: Write>(store: &dyn RecordStore, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Activity Type", "Activity", "Category", "Volunteer", "Points"])?;
    for record in store.list_activity()? {
        writer.write_record([
            record.kind.as_str(),
            &record.label,
            &record.category,
            &record.volunteer,
            &record.score.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-volunteer totals summary, ranked by score.
pub fn write_totals_csv<W: Write>(store: &dyn RecordStore, out: W) -> Result<()> {
    let totals = store.activity_totals(TotalsOrder::ScoreDesc)?;
    write_total_rows(&totals, out)
}

fn write_total_rows<W: Write>(totals: &[TotalRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Volunteer", "Total Points"])?;
    for row in totals {
        writer.write_record([row.volunteer.as_str(), &row.total_score.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the usage table, ordered by volunteer name.
pub fn write_usage_csv<W: Write>(store: &dyn RecordStore, out: W) -> Result<()> {
    let usage = store.list_usage()?;
    write_usage_rows(&usage, out)
}

fn write_usage_rows<W: Write>(usage: &[UsageRecord], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["Volunteer", "Total Points", "Used Points", "Courses Redeemed"])?;
    for record in usage {
        writer.write_record([
            record.volunteer.as_str(),
            &record.total_points.to_string(),
            &record.used_points.to_string(),
            &record.course_count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_activity_rows(&[
                row(&["on-site", "2024-01-01 meetup", "outreach", "Alice", "10"]),
                row(&["livestream", "2024-01-02 stream", "poster", "Bob", "25"]),
            ])
            .unwrap();
        store.upsert_usage("Alice", 5, 1).unwrap();
        store
    }

    #[test]
    fn test_activity_sheet() {
        let store = seeded_store();
        let mut out = Vec::new();
        write_activity_csv(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Activity Type,Activity,Category,Volunteer,Points"
        );
        assert_eq!(
            lines.next().unwrap(),
            "on-site,2024-01-01 meetup,outreach,Alice,10"
        );
        assert_eq!(
            lines.next().unwrap(),
            "livestream,2024-01-02 stream,poster,Bob,25"
        );
    }

    #[test]
    fn test_totals_sheet_ranked_by_score() {
        let store = seeded_store();
        let mut out = Vec::new();
        write_totals_csv(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Volunteer,Total Points", "Bob,25", "Alice,10"]);
    }

    #[test]
    fn test_usage_sheet() {
        let store = seeded_store();
        let mut out = Vec::new();
        write_usage_csv(&store, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Volunteer,Total Points,Used Points,Courses Redeemed",
                "Alice,10,5,1"
            ]
        );
    }
}
