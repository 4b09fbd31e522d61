//! Repository Pattern for the item store
//!
//! The harvester engine only talks to the [`ItemStore`] trait, so the
//! SQLite store can be swapped for the in-memory [`MockItemStore`] in tests.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Harvester engine                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ItemStore trait                          │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//!        ┌─────────────────┐           ┌─────────────────┐
//!        │     SQLite      │           │      Mock       │
//!        └─────────────────┘           └─────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{HarvestStats, InsertOutcome, NewRecord, Record};
use crate::utils::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable keyed store of harvested records
///
/// Records are immutable once written and `identifier` is unique across the
/// whole store, regardless of harvester.
pub trait ItemStore: Send + Sync {
    /// Largest `source_date` persisted for `harvester`, if any
    fn max_source_date(&self, harvester: &str) -> StoreResult<Option<String>>;

    /// Insert `record` unless its identifier is already present
    ///
    /// Each call is its own atomic unit. An existing identifier is reported
    /// as [`InsertOutcome::Duplicate`], never as an error.
    fn insert(&self, record: &NewRecord) -> StoreResult<InsertOutcome>;

    /// Look up a record by identifier
    fn get(&self, identifier: &str) -> StoreResult<Option<Record>>;

    /// Record count and latest dates for `harvester`
    fn stats(&self, harvester: &str) -> StoreResult<HarvestStats>;

    /// Records of `harvester` inserted after `since`, oldest first
    fn harvested_since(
        &self,
        harvester: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Record>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`ItemStore`]
///
/// Uses `Mutex` to share the single connection.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Open (and create if needed) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite item store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_schema(&self) -> StoreResult<()> {
        self.lock().execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS item (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    harvester TEXT NOT NULL,
                    source TEXT NOT NULL,
                    identifier TEXT NOT NULL UNIQUE,
                    source_date TEXT NOT NULL,
                    content TEXT,
                    harvest_date TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_item_harvester_source_date
                    ON item(harvester, source_date);

                CREATE INDEX IF NOT EXISTS idx_item_harvest_date
                    ON item(harvest_date);
                "#,
        )?;

        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
        let harvest_date: String = row.get(6)?;
        let harvest_date = DateTime::parse_from_rfc3339(&harvest_date)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Record {
            id: row.get(0)?,
            harvester: row.get(1)?,
            source: row.get(2)?,
            identifier: row.get(3)?,
            source_date: row.get(4)?,
            content: row.get(5)?,
            harvest_date,
        })
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl ItemStore for SqliteItemStore {
    fn max_source_date(&self, harvester: &str) -> StoreResult<Option<String>> {
        let conn = self.lock();
        let max: Option<String> = conn.query_row(
            "SELECT MAX(source_date) FROM item WHERE harvester = ?1",
            params![harvester],
            |row| row.get(0),
        )?;

        Ok(max)
    }

    fn insert(&self, record: &NewRecord) -> StoreResult<InsertOutcome> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
                INSERT INTO item (harvester, source, identifier, source_date, content, harvest_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                record.harvester,
                record.source,
                record.identifier,
                record.source_date,
                record.content,
                timestamp(Utc::now()),
            ],
        );

        match inserted {
            Ok(_) => {
                tx.commit()?;
                Ok(InsertOutcome::Inserted)
            }
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(identifier = %record.identifier, "Record already stored");
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, identifier: &str) -> StoreResult<Option<Record>> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT id, harvester, source, identifier, source_date, content, harvest_date
                 FROM item WHERE identifier = ?1",
                params![identifier],
                Self::row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    fn stats(&self, harvester: &str) -> StoreResult<HarvestStats> {
        let conn = self.lock();
        let (records, latest_source_date, latest_harvest_date) = conn.query_row(
            "SELECT COUNT(*), MAX(source_date), MAX(harvest_date) FROM item WHERE harvester = ?1",
            params![harvester],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )?;

        Ok(HarvestStats {
            records: records as usize,
            latest_source_date,
            latest_harvest_date: latest_harvest_date
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    fn harvested_since(
        &self,
        harvester: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Record>> {
        let conn = self.lock();
        let since = since.map(timestamp).unwrap_or_default();

        let mut stmt = conn.prepare(
            "SELECT id, harvester, source, identifier, source_date, content, harvest_date
             FROM item
             WHERE harvester = ?1 AND harvest_date > ?2
             ORDER BY harvest_date ASC, id ASC
             LIMIT ?3",
        )?;

        let records = stmt
            .query_map(params![harvester, since, limit as i64], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of [`ItemStore`]
///
/// Can be told to fail the next N inserts with a transient error, to exercise
/// the store retry policy.
#[derive(Default)]
pub struct MockItemStore {
    records: RwLock<BTreeMap<String, Record>>,
    next_id: AtomicU32,
    failing_inserts: AtomicU32,
    insert_calls: AtomicU32,
}

impl MockItemStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` insert calls with a transient (busy) error
    pub fn fail_next_inserts(&self, count: u32) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Number of insert calls made, including failed ones
    pub fn insert_calls(&self) -> u32 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Get the number of records
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Identifiers of all stored records, sorted
    pub fn identifiers(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Record>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ItemStore for MockItemStore {
    fn max_source_date(&self, harvester: &str) -> StoreResult<Option<String>> {
        Ok(self
            .read()
            .values()
            .filter(|r| r.harvester == harvester)
            .map(|r| r.source_date.clone())
            .max())
    }

    fn insert(&self, record: &NewRecord) -> StoreResult<InsertOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Transient(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some("database is locked".to_string()),
            )));
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.identifier) {
            return Ok(InsertOutcome::Duplicate);
        }

        let id = i64::from(self.next_id.fetch_add(1, Ordering::SeqCst)) + 1;
        records.insert(
            record.identifier.clone(),
            Record {
                id,
                harvester: record.harvester.clone(),
                source: record.source.clone(),
                identifier: record.identifier.clone(),
                source_date: record.source_date.clone(),
                content: record.content.clone(),
                harvest_date: Utc::now(),
            },
        );

        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, identifier: &str) -> StoreResult<Option<Record>> {
        Ok(self.read().get(identifier).cloned())
    }

    fn stats(&self, harvester: &str) -> StoreResult<HarvestStats> {
        let records = self.read();
        let mine: Vec<&Record> = records.values().filter(|r| r.harvester == harvester).collect();

        Ok(HarvestStats {
            records: mine.len(),
            latest_source_date: mine.iter().map(|r| r.source_date.clone()).max(),
            latest_harvest_date: mine.iter().map(|r| r.harvest_date).max(),
        })
    }

    fn harvested_since(
        &self,
        harvester: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Record>> {
        let mut matching: Vec<Record> = self
            .read()
            .values()
            .filter(|r| r.harvester == harvester)
            .filter(|r| since.map_or(true, |since| r.harvest_date > since))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.harvest_date, r.id));
        matching.truncate(limit);

        Ok(matching)
    }
}

// ============================================================================
// Shared Store Types
// ============================================================================

/// Thread-safe shared store handle
pub type SharedItemStore = Arc<dyn ItemStore>;

/// Open a shared SQLite store
pub fn open_sqlite_store(path: impl AsRef<Path>) -> StoreResult<SharedItemStore> {
    Ok(Arc::new(SqliteItemStore::open(path)?))
}

// ============================================================================
// Tests
// ============================================================================
