// Core data structures for the harvester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which harvester produced a record, and from which upstream catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestIdentity {
    pub harvester_name: String,
    pub source_name: String,
}

impl HarvestIdentity {
    pub fn new(harvester_name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            harvester_name: harvester_name.into(),
            source_name: source_name.into(),
        }
    }

    /// Build a record for this harvester
    pub fn record(
        &self,
        identifier: impl Into<String>,
        source_date: impl Into<String>,
        content: Option<String>,
    ) -> NewRecord {
        NewRecord {
            harvester: self.harvester_name.clone(),
            source: self.source_name.clone(),
            identifier: identifier.into(),
            source_date: source_date.into(),
            content,
        }
    }
}

/// A record converted from a feed entry, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub harvester: String,
    pub source: String,
    /// Natural key, unique across the whole store
    pub identifier: String,
    /// Resumption cursor value (ingestion date, or a synthesized per-day date)
    pub source_date: String,
    /// Raw entry serialization; `None` when the source has no per-entry payload
    pub content: Option<String>,
}

/// A persisted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub harvester: String,
    pub source: String,
    pub identifier: String,
    pub source_date: String,
    pub content: Option<String>,
    /// Local insertion time
    pub harvest_date: DateTime<Utc>,
}

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same identifier already exists; nothing was written
    Duplicate,
}

/// Per-harvester store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub records: usize,
    pub latest_source_date: Option<String>,
    pub latest_harvest_date: Option<DateTime<Utc>>,
}

/// Summary of one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Resumption date the run started from
    pub start_date: String,
    pub pages: usize,
    pub entries: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// True when the run ended on the page cap rather than on a terminal cursor
    pub page_limit_reached: bool,
}

impl HarvestReport {
    pub fn new(start_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            ..Default::default()
        }
    }

    pub fn record_outcome(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Duplicate => self.duplicates += 1,
        }
    }
}
