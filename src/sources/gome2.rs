//! Gap detection for GOME-2 style coverages
//!
//! The upstream only reports which days of a month have *no* product. Each
//! cycle enumerates the calendar days of one window, subtracts the reported
//! missing days, and emits the remaining dates as entries. Windows end at the
//! month's last day, or at today for the current month; the run ends once a
//! window reaches today.

use chrono::{Datelike, Months, NaiveDate};
use std::collections::HashSet;

use super::{Cursor, Entry, SourceAdapter, SourceKind};
use crate::error::Result;
use crate::models::{HarvestIdentity, NewRecord};
use crate::parser::{Feed, FeedFormat};
use crate::utils::error::SourceError;
use crate::utils::parse_iso_date;
use crate::utils::template::format_template;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct Gome2Adapter {
    url_template: String,
    coverage: String,
    today: NaiveDate,
}

impl Gome2Adapter {
    pub fn new(url_template: &str, coverage: &str, today: NaiveDate) -> Self {
        Self {
            url_template: url_template.to_string(),
            coverage: coverage.to_string(),
            today,
        }
    }

    fn window_cursor(&self, start_date: NaiveDate) -> Result<Cursor> {
        let date = start_date.format(DATE_FORMAT).to_string();
        let year = start_date.year().to_string();
        let month = format!("{:02}", start_date.month());

        let url = format_template(
            &self.url_template,
            &[
                ("start_date", &date),
                ("coverage", &self.coverage),
                ("year", &year),
                ("month", &month),
            ],
        )?;

        Ok(Cursor::Window { start_date, url })
    }

    fn window_start(&self, cursor: &Cursor) -> Result<NaiveDate> {
        match cursor {
            Cursor::Window { start_date, .. } => Ok(*start_date),
            Cursor::Link(_) => Err(SourceError::UnexpectedCursor(self.kind().as_str()).into()),
        }
    }

    fn missing_dates<'a>(&self, feed: &'a Feed) -> Result<&'a HashSet<String>> {
        match feed {
            Feed::MissingDates(missing) => Ok(missing),
            _ => Err(SourceError::UnexpectedFeed(self.kind().as_str()).into()),
        }
    }
}

impl SourceAdapter for Gome2Adapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Gome2
    }

    fn feed_format(&self) -> FeedFormat {
        FeedFormat::MissingDates
    }

    fn start_cursor(&self, start_date: &str) -> Result<Cursor> {
        tracing::debug!(start_date, coverage = %self.coverage, "Building start cursor");
        self.window_cursor(parse_iso_date(start_date)?)
    }

    fn extract_entries(&self, feed: &Feed, cursor: &Cursor) -> Result<Vec<Entry>> {
        let missing = self.missing_dates(feed)?;
        let window = dates_in_window(self.window_start(cursor)?, self.today);

        tracing::debug!(
            window_days = window.len(),
            missing = missing.len(),
            "Subtracting missing dates"
        );

        Ok(window
            .into_iter()
            .map(|date| date.format(DATE_FORMAT).to_string())
            .filter(|date| !missing.contains(date))
            .map(Entry::Date)
            .collect())
    }

    fn next_cursor(&self, _feed: &Feed, cursor: &Cursor) -> Result<Option<Cursor>> {
        let start = self.window_start(cursor)?;
        match next_window_start(start, self.today) {
            Some(next) => self.window_cursor(next).map(Some),
            None => {
                tracing::debug!(today = %self.today, "Caught up to today");
                Ok(None)
            }
        }
    }

    fn convert(&self, entry: &Entry, identity: &HarvestIdentity) -> Result<NewRecord> {
        let Entry::Date(date) = entry else {
            return Err(SourceError::UnexpectedEntry(self.kind().as_str()).into());
        };

        let identifier = format!("{}_{}", self.coverage, date);
        tracing::debug!(identifier = %identifier, "Found date with product");
        Ok(identity.record(identifier, date.as_str(), None))
    }
}

/// Last calendar day of `date`'s month
fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .unwrap_or(date)
}

/// Last day enumerated for the window starting at `start`
///
/// Months strictly before today's month are taken whole; otherwise the window
/// stops at today.
fn window_end(start: NaiveDate, today: NaiveDate) -> NaiveDate {
    if (start.year(), start.month()) < (today.year(), today.month()) {
        last_day_of_month(start)
    } else {
        today
    }
}

/// Every calendar day from `start` to the end of its window, inclusive
pub fn dates_in_window(start: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let end = window_end(start, today);
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Start of the window after the one beginning at `start`, or `None` once caught up
pub fn next_window_start(start: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let last = dates_in_window(start, today).pop()?;
    if last < today {
        last.succ_opt()
    } else {
        None
    }
}
