//! Error types for pointledger-core

use thiserror::Error;

/// Main error type for the pointledger-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A storage handle could not be acquired within the retry budget.
    ///
    /// Retryable from the caller's point of view; the internal retry
    /// budget has already been spent.
    #[error("storage unavailable: {what} failed after {attempts} attempt(s): {cause}")]
    Unavailable {
        /// What was being acquired
        what: String,
        /// How many attempts were made
        attempts: u32,
        /// Last underlying failure
        cause: String,
    },

    /// A schema migration step could not complete
    #[error("schema migration failed: {0}")]
    Migration(String),

    /// Operation-level repository failure
    #[error("repository error: {0}")]
    Repository(String),

    /// Embedded database error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Networked database error
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Connection pool error
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Spreadsheet export error
    #[error("export error: {0}")]
    Export(#[from] csv::Error),
}

/// Result type alias for pointledger-core
pub type Result<T> = std::result::Result<T, Error>;
