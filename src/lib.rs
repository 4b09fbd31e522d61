//! catalog-harvester - Resumable catalog feed harvester
//!
//! Incrementally harvests paginated catalog feeds (OpenSearch, DHuS, ProbaV
//! and gap-detecting "missing dates" endpoints) into a deduplicated SQLite
//! store, resuming from the most recently seen record on every run.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - TOML harvester configuration
//! - [`harvest`] - Fetcher, rate limiting and the resumable harvest loop
//! - [`sources`] - Catalog-specific source adapters
//! - [`parser`] - Atom/OpenSearch and missing-dates parsing
//! - [`models`] - Core data structures and types
//! - [`storage`] - SQLite item store
//! - [`utils`] - Retry policy, URL templates, pid lock and domain errors
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvester::config::HarvesterConfig;
//! use catalog_harvester::harvest::Harvester;
//! use catalog_harvester::storage::open_sqlite_store;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarvesterConfig::from_file(Path::new("harvester.toml"))?;
//!     config.validate()?;
//!     let store = open_sqlite_store(&config.database)?;
//!     let report = Harvester::from_config(&config, store)?.run().await?;
//!     println!("{} new records", report.inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod parser;
pub mod sources;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AuthConfig, HarvesterConfig};
    pub use crate::error::{Error, ErrorCategory, HarvesterErrorTrait, Result};
    pub use crate::harvest::{FeedFetcher, Harvester, Pacer};
    pub use crate::models::{HarvestIdentity, HarvestReport, InsertOutcome, NewRecord, Record};
    pub use crate::sources::{Cursor, Entry, SourceAdapter, SourceKind, SourceOptions};
    pub use crate::storage::{ItemStore, SharedItemStore, SqliteItemStore};
    pub use crate::utils::retry::RetryPolicy;
}

// Direct re-exports for convenience
pub use models::{HarvestIdentity, HarvestReport, NewRecord, Record};
