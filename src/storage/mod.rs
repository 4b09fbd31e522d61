//! Persistence of harvested records
//!
//! Records live in a single SQLite table keyed by a unique `identifier`.
//! The only durable resumption state is `max(source_date)` per harvester.

pub mod repository;

pub use repository::{
    open_sqlite_store, ItemStore, MockItemStore, SharedItemStore, SqliteItemStore, StoreResult,
};
