//! pointledger - CLI for the volunteer activity point ledger
//!
//! Drives the configured store: submits decoded batches, prints
//! aggregates, and writes the CSV export sheets.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/pointledger/pointledger.db
//! - Logs: $XDG_STATE_HOME/pointledger/pointledger.log
//! - Config: $XDG_CONFIG_HOME/pointledger/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pointledger_core::{export, open_store, submit_batch, Config, RecordStore, SubmissionBatch, TotalsOrder};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pointledger")]
#[command(about = "Volunteer activity point ledger")]
#[command(version)]
struct Cli {
    /// Path to an alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a JSON batch of activity and usage rows
    Submit {
        /// JSON file with "activity" and/or "usage" row arrays
        file: PathBuf,
    },
    /// Print per-volunteer activity totals
    Totals {
        /// Rank by total score instead of name
        #[arg(long)]
        by_score: bool,
    },
    /// Print usage records
    Usage,
    /// Write one of the CSV export sheets
    Export {
        /// Which sheet to write
        #[arg(value_enum)]
        target: ExportTarget,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Probe the configured store
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportTarget {
    /// Raw activity log
    Activity,
    /// Per-volunteer totals summary
    Totals,
    /// Usage table
    Usage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Initialize logging
    let _log_guard = pointledger_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!(mode = config.storage.mode.as_str(), "pointledger starting");

    let store = open_store(&config.storage).context("failed to open store")?;

    match cli.command {
        Command::Submit { file } => submit(store.as_ref(), &file),
        Command::Totals { by_score } => totals(store.as_ref(), by_score),
        Command::Usage => usage(store.as_ref()),
        Command::Export { target, output } => export_sheet(store.as_ref(), target, output),
        Command::Health => {
            store.health_check().context("store unreachable")?;
            println!("ok");
            Ok(())
        }
    }
}

fn submit(store: &dyn RecordStore, file: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read batch file {}", file.display()))?;
    let batch: SubmissionBatch =
        serde_json::from_str(&content).context("failed to parse batch file")?;

    let outcome = submit_batch(store, &batch).context("failed to apply submission")?;
    println!(
        "Stored {} activity record(s), merged {} usage record(s)",
        outcome.activity_inserted, outcome.usage_merged
    );
    Ok(())
}

fn totals(store: &dyn RecordStore, by_score: bool) -> Result<()> {
    let order = if by_score {
        TotalsOrder::ScoreDesc
    } else {
        TotalsOrder::NameAsc
    };
    let rows = store.activity_totals(order).context("failed to aggregate totals")?;

    if rows.is_empty() {
        println!("No activity records");
        return Ok(());
    }
    for row in rows {
        println!("{}\t{}", row.volunteer, row.total_score);
    }
    Ok(())
}

fn usage(store: &dyn RecordStore) -> Result<()> {
    let records = store.list_usage().context("failed to list usage records")?;

    if records.is_empty() {
        println!("No usage records");
        return Ok(());
    }
    for record in records {
        println!(
            "{}\ttotal {}\tused {}\tcourses {}",
            record.volunteer, record.total_points, record.used_points, record.course_count
        );
    }
    Ok(())
}

fn export_sheet(
    store: &dyn RecordStore,
    target: ExportTarget,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut out: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    match target {
        ExportTarget::Activity => export::write_activity_csv(store, &mut out),
        ExportTarget::Totals => export::write_totals_csv(store, &mut out),
        ExportTarget::Usage => export::write_usage_csv(store, &mut out),
    }
    .context("failed to write export")?;

    if let Some(path) = output {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
