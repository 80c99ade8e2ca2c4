//! # pointledger-core
//!
//! Core library for pointledger - a volunteer activity point ledger.
//!
//! This library provides:
//! - Domain types for activity and usage records
//! - A uniform storage layer with three interchangeable backends
//!   (in-memory, embedded SQLite, pooled PostgreSQL)
//! - Idempotent schema management with legacy-layout migration
//! - Configuration management
//! - Logging infrastructure
//! - CSV spreadsheet export
//!
//! ## Architecture
//!
//! Activity records form an additive log; usage records are a
//! per-volunteer aggregate keyed by name. The repository recomputes
//! usage totals from the activity log at every merge, so stored totals
//! cannot drift. Backends are selected once from configuration; callers
//! hold the [`RecordStore`] trait and never branch on mode.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pointledger_core::{open_store, Config};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open the configured store (schema is ensured on open)
//! let store = open_store(&config.storage).expect("failed to open store");
//! store.health_check().expect("store unreachable");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, StorageConfig, StorageMode};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use store::{open_store, RecordStore};
pub use submit::{submit_batch, SubmissionBatch, SubmitOutcome};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod retry;
pub mod store;
pub mod submit;
pub mod types;
