//! Resumable harvest loop
//!
//! ```text
//! resume date ─▶ start cursor ─▶ ┌─ fetch ─▶ parse ─▶ entries ─▶ convert ─▶ persist ─┐
//!                                └──────────── pace ◀── next cursor? ◀──────────────┘
//! ```
//!
//! The store's largest `source_date` for this harvester is the only durable
//! resumption state. Pages are processed strictly one after the other, and
//! every record of a page is persisted before the next fetch starts.

use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::fetcher::FeedFetcher;
use super::pacer::Pacer;
use crate::config::HarvesterConfig;
use crate::error::{Error, Result};
use crate::models::{HarvestIdentity, HarvestReport, InsertOutcome, NewRecord};
use crate::parser::parse_feed;
use crate::sources::{Cursor, SourceAdapter};
use crate::storage::SharedItemStore;
use crate::utils::retry::{retry, RetryPolicy};

/// Harvester engine: one adapter, one store, one fetcher
pub struct Harvester {
    identity: HarvestIdentity,

    /// Fallback resumption date for an empty store
    default_start_date: String,

    source: Box<dyn SourceAdapter>,
    fetcher: FeedFetcher,
    store: SharedItemStore,

    /// Retry policy for record inserts
    store_policy: RetryPolicy,

    pacer: Pacer,
    max_pages: Option<usize>,
}

impl Harvester {
    pub fn new(
        identity: HarvestIdentity,
        default_start_date: impl Into<String>,
        source: Box<dyn SourceAdapter>,
        fetcher: FeedFetcher,
        store: SharedItemStore,
    ) -> Self {
        Self {
            identity,
            default_start_date: default_start_date.into(),
            source,
            fetcher,
            store,
            store_policy: RetryPolicy::store(),
            pacer: Pacer::default(),
            max_pages: None,
        }
    }

    /// Build a harvester from a validated configuration
    pub fn from_config(config: &HarvesterConfig, store: SharedItemStore) -> Result<Self> {
        let source = config.source.build(&config.source_options())?;
        let fetcher = FeedFetcher::new(config.request_timeout(), config.auth.clone())?;

        Ok(Self::new(
            config.identity(),
            config.start_date.clone(),
            source,
            fetcher,
            store,
        )
        .with_max_pages(config.max_pages))
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_store_policy(mut self, policy: RetryPolicy) -> Self {
        self.store_policy = policy;
        self
    }

    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn identity(&self) -> &HarvestIdentity {
        &self.identity
    }

    /// Date the next run starts from: the store's latest `source_date`, else the default
    pub fn resume_date(&self) -> Result<String> {
        let latest = self.store.max_source_date(&self.identity.harvester_name)?;
        Ok(latest.unwrap_or_else(|| self.default_start_date.clone()))
    }

    /// Harvest until the adapter reports no further page
    ///
    /// # Errors
    ///
    /// Any fetch failure that survives the retry policy, any parse or
    /// conversion failure, any non-duplicate store failure that survives its
    /// retry policy, and a next cursor that was already fetched in this run.
    /// Records persisted before the failure stay persisted.
    #[instrument(skip(self), fields(harvester = %self.identity.harvester_name, source = %self.source.kind()))]
    pub async fn run(&self) -> Result<HarvestReport> {
        let start_date = self.resume_date()?;
        info!(start_date = %start_date, "Starting harvest");

        let mut report = HarvestReport::new(&start_date);
        let mut fetched = HashSet::new();
        let mut cursor = self.source.start_cursor(&start_date)?;

        loop {
            self.pacer.until_ready().await;
            fetched.insert(cursor.url().to_string());

            let next = self.harvest_page(&cursor, &mut report).await?;

            match next {
                None => break,
                Some(next) if fetched.contains(next.url()) => {
                    warn!(url = next.url(), "Next cursor was already fetched in this run");
                    return Err(Error::CursorRepeated(next.url().to_string()));
                }
                Some(_) if self.max_pages.is_some_and(|max| report.pages >= max) => {
                    warn!(pages = report.pages, "Page limit reached, stopping early");
                    report.page_limit_reached = true;
                    break;
                }
                Some(next) => cursor = next,
            }
        }

        info!(
            pages = report.pages,
            entries = report.entries,
            inserted = report.inserted,
            duplicates = report.duplicates,
            "Harvest complete"
        );
        Ok(report)
    }

    /// Fetch, parse, convert and persist one page; returns the next cursor
    async fn harvest_page(
        &self,
        cursor: &Cursor,
        report: &mut HarvestReport,
    ) -> Result<Option<Cursor>> {
        let page = report.pages + 1;
        debug!(page, cursor = %cursor, "Fetching page");

        let body = self.fetcher.fetch(cursor.url()).await?;
        let feed = parse_feed(self.source.feed_format(), &body)?;

        let entries = self.source.extract_entries(&feed, cursor)?;
        let next = self.source.next_cursor(&feed, cursor)?;

        let mut inserted = 0;
        for entry in &entries {
            let record = self.source.convert(entry, &self.identity)?;
            let outcome = self.persist(&record).await?;
            if outcome == InsertOutcome::Inserted {
                inserted += 1;
            }
            report.record_outcome(outcome);
        }

        report.pages = page;
        report.entries += entries.len();

        info!(
            page,
            url = cursor.url(),
            entries = entries.len(),
            inserted,
            has_next = next.is_some(),
            "Page harvested"
        );
        Ok(next)
    }

    /// Insert one record under the store retry policy
    async fn persist(&self, record: &NewRecord) -> Result<InsertOutcome> {
        let outcome = retry(&self.store_policy, || async { self.store.insert(record) }).await?;

        if outcome == InsertOutcome::Duplicate {
            debug!(identifier = %record.identifier, "Skipping duplicate record");
        }
        Ok(outcome)
    }
}
