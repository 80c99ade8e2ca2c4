//! Schema management and legacy migration
//!
//! `ensure_*` is idempotent and race-safe: SQLite work runs inside an
//! exclusive transaction, Postgres work under an advisory transaction
//! lock. Each call either leaves the schema fully current or rolls back
//! untouched.
//!
//! Legacy layouts are detected structurally. Activity tables written
//! before classification was introduced miss the `activity_type` column
//! (it is added and backfilled), or carry it in the wrong position or
//! under the old column names `activity_time_name`/`name` (the table is
//! rebuilt in canonical order). The old two-value encoding
//! `offline`/`online` is translated to the display labels either during
//! the rebuild copy or in place.

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Advisory lock key serializing concurrent Postgres migrations
const PG_MIGRATION_LOCK: i64 = 0x706c_6564;

fn sqlite_activity_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE {} (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_type  TEXT NOT NULL,
            activity_label TEXT NOT NULL,
            category       TEXT NOT NULL,
            volunteer_name TEXT NOT NULL,
            score          INTEGER NOT NULL DEFAULT 0
        );
        "#,
        table
    )
}

const SQLITE_USAGE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS usage_records (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        volunteer_name TEXT NOT NULL UNIQUE,
        total_points   INTEGER NOT NULL DEFAULT 0,
        used_points    INTEGER NOT NULL DEFAULT 0,
        course_count   INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_activity_volunteer
        ON activity_records(volunteer_name);
"#;

/// Ensure the SQLite schema is current, migrating legacy layouts.
pub fn ensure_sqlite(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    match apply_sqlite(&tx) {
        Ok(()) => tx.commit().map_err(|e| Error::Migration(e.to_string())),
        Err(e) => Err(Error::Migration(e.to_string())),
    }
}

fn apply_sqlite(tx: &Transaction) -> rusqlite::Result<()> {
    if sqlite_table_exists(tx, "activity_records")? {
        migrate_sqlite_activity(tx)?;
    } else {
        tx.execute_batch(&sqlite_activity_ddl("activity_records"))?;
    }
    tx.execute_batch(SQLITE_USAGE_DDL)?;
    Ok(())
}

fn sqlite_table_exists(tx: &Transaction, table: &str) -> rusqlite::Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

fn sqlite_columns(tx: &Transaction, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Picks the canonical column name when present, the legacy one otherwise.
fn column_or_legacy<'a>(columns: &[String], canonical: &'a str, legacy: &'a str) -> &'a str {
    if columns.iter().any(|c| c == canonical) {
        canonical
    } else {
        legacy
    }
}

fn migrate_sqlite_activity(tx: &Transaction) -> rusqlite::Result<()> {
    let mut columns = sqlite_columns(tx, "activity_records")?;

    if !columns.iter().any(|c| c == "activity_type") {
        tx.execute("ALTER TABLE activity_records ADD COLUMN activity_type TEXT", [])?;
        tx.execute(
            "UPDATE activity_records SET activity_type = 'on-site' WHERE activity_type IS NULL",
            [],
        )?;
        tracing::info!("added activity_type column to legacy activity table");
        columns = sqlite_columns(tx, "activity_records")?;
    }

    let label_col = column_or_legacy(&columns, "activity_label", "activity_time_name");
    let name_col = column_or_legacy(&columns, "volunteer_name", "name");
    let canonical = columns.get(1).map(String::as_str) == Some("activity_type")
        && label_col == "activity_label"
        && name_col == "volunteer_name";

    if canonical {
        tx.execute(
            "UPDATE activity_records SET activity_type = 'on-site' WHERE activity_type = 'offline'",
            [],
        )?;
        tx.execute(
            "UPDATE activity_records SET activity_type = 'livestream' WHERE activity_type = 'online'",
            [],
        )?;
        return Ok(());
    }

    tracing::info!(label_col, name_col, "rebuilding legacy activity table");
    tx.execute_batch(&format!(
        r#"
        {create}

        INSERT INTO activity_records_new
            (activity_type, activity_label, category, volunteer_name, score)
        SELECT
            CASE activity_type
                WHEN 'offline' THEN 'on-site'
                WHEN 'online' THEN 'livestream'
                ELSE COALESCE(activity_type, 'on-site')
            END,
            {label_col},
            category,
            {name_col},
            MAX(CAST(score AS INTEGER), 0)
        FROM activity_records
        ORDER BY id;

        DROP TABLE activity_records;
        ALTER TABLE activity_records_new RENAME TO activity_records;
        "#,
        create = sqlite_activity_ddl("activity_records_new"),
        label_col = label_col,
        name_col = name_col,
    ))?;
    Ok(())
}

// ============================================
// Postgres
// ============================================

const PG_TABLES_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS activity_records (
        id             BIGSERIAL PRIMARY KEY,
        activity_type  TEXT NOT NULL,
        activity_label TEXT NOT NULL,
        category       TEXT NOT NULL,
        volunteer_name TEXT NOT NULL,
        score          BIGINT NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS usage_records (
        id             BIGSERIAL PRIMARY KEY,
        volunteer_name TEXT NOT NULL UNIQUE,
        total_points   BIGINT NOT NULL DEFAULT 0,
        used_points    BIGINT NOT NULL DEFAULT 0,
        course_count   BIGINT NOT NULL DEFAULT 0
    );
"#;

const PG_INDEX_DDL: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_activity_volunteer
        ON activity_records(volunteer_name);
"#;

/// Ensure the Postgres schema is current, migrating legacy layouts.
pub fn ensure_postgres(client: &mut postgres::Client) -> Result<()> {
    let outcome = (|| -> std::result::Result<(), postgres::Error> {
        let mut tx = client.transaction()?;
        tx.execute("SELECT pg_advisory_xact_lock($1)", &[&PG_MIGRATION_LOCK])?;
        apply_postgres(&mut tx)?;
        tx.commit()?;
        Ok(())
    })();
    outcome.map_err(|e| Error::Migration(e.to_string()))
}

fn apply_postgres(tx: &mut postgres::Transaction) -> std::result::Result<(), postgres::Error> {
    tx.batch_execute(PG_TABLES_DDL)?;
    migrate_postgres_activity(tx)?;
    tx.batch_execute(PG_INDEX_DDL)?;
    Ok(())
}

fn pg_columns(
    tx: &mut postgres::Transaction,
    table: &str,
) -> std::result::Result<Vec<String>, postgres::Error> {
    let rows = tx.query(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 \
         ORDER BY ordinal_position",
        &[&table],
    )?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

fn migrate_postgres_activity(
    tx: &mut postgres::Transaction,
) -> std::result::Result<(), postgres::Error> {
    let mut columns = pg_columns(tx, "activity_records")?;

    if !columns.iter().any(|c| c == "activity_type") {
        tx.batch_execute(
            "ALTER TABLE activity_records ADD COLUMN activity_type TEXT;
             UPDATE activity_records SET activity_type = 'on-site' WHERE activity_type IS NULL;",
        )?;
        tracing::info!("added activity_type column to legacy activity table");
        columns = pg_columns(tx, "activity_records")?;
    }

    let label_col = column_or_legacy(&columns, "activity_label", "activity_time_name");
    let name_col = column_or_legacy(&columns, "volunteer_name", "name");
    let canonical = columns.get(1).map(String::as_str) == Some("activity_type")
        && label_col == "activity_label"
        && name_col == "volunteer_name";

    if canonical {
        tx.execute(
            "UPDATE activity_records SET activity_type = 'on-site' WHERE activity_type = 'offline'",
            &[],
        )?;
        tx.execute(
            "UPDATE activity_records SET activity_type = 'livestream' WHERE activity_type = 'online'",
            &[],
        )?;
        return Ok(());
    }

    tracing::info!(label_col, name_col, "rebuilding legacy activity table");
    tx.batch_execute(&format!(
        r#"
        CREATE TABLE activity_records_new (
            id             BIGSERIAL PRIMARY KEY,
            activity_type  TEXT NOT NULL,
            activity_label TEXT NOT NULL,
            category       TEXT NOT NULL,
            volunteer_name TEXT NOT NULL,
            score          BIGINT NOT NULL DEFAULT 0
        );

        INSERT INTO activity_records_new
            (activity_type, activity_label, category, volunteer_name, score)
        SELECT
            CASE activity_type
                WHEN 'offline' THEN 'on-site'
                WHEN 'online' THEN 'livestream'
                ELSE COALESCE(activity_type, 'on-site')
            END,
            {label_col},
            category,
            {name_col},
            CASE
                WHEN score::text ~ '^-?[0-9]+$' THEN GREATEST((score::text)::bigint, 0)
                ELSE 0
            END
        FROM activity_records
        ORDER BY id;

        DROP TABLE activity_records;
        ALTER TABLE activity_records_new RENAME TO activity_records;
        "#,
        label_col = label_col,
        name_col = name_col,
    ))?;
    Ok(())
}
