//! Plain OpenSearch catalogs, plus the Atom helpers shared with the DHuS and
//! ProbaV adapters

use url::Url;

use super::{Cursor, Entry, SourceAdapter, SourceKind};
use crate::error::Result;
use crate::models::{HarvestIdentity, NewRecord};
use crate::parser::{AtomEntry, AtomFeed, Feed, FeedFormat};
use crate::utils::error::SourceError;
use crate::utils::template::format_template;

/// OpenSearch field holding the product identifier
pub const IDENTIFIER_FIELD: (&str, &str) = ("str", "identifier");

/// OpenSearch field holding the ingestion date
pub const INGESTION_DATE_FIELD: (&str, &str) = ("date", "ingestiondate");

/// Generic OpenSearch adapter: `{start_date}` template, `link[rel=next]` pagination
#[derive(Debug, Clone)]
pub struct OpenSearchAdapter {
    url_template: String,
}

impl OpenSearchAdapter {
    pub fn new(url_template: &str) -> Self {
        Self {
            url_template: url_template.to_string(),
        }
    }
}

impl SourceAdapter for OpenSearchAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenSearch
    }

    fn feed_format(&self) -> FeedFormat {
        FeedFormat::Atom
    }

    fn start_cursor(&self, start_date: &str) -> Result<Cursor> {
        tracing::debug!(start_date, "Building start cursor");
        let url = format_template(&self.url_template, &[("start_date", start_date)])?;
        Ok(Cursor::Link(url))
    }

    fn extract_entries(&self, feed: &Feed, _cursor: &Cursor) -> Result<Vec<Entry>> {
        atom_entries(atom_feed(feed, self.kind())?)
    }

    fn next_cursor(&self, feed: &Feed, cursor: &Cursor) -> Result<Option<Cursor>> {
        Ok(next_link(atom_feed(feed, self.kind())?, cursor).map(Cursor::Link))
    }

    fn convert(&self, entry: &Entry, identity: &HarvestIdentity) -> Result<NewRecord> {
        let entry = atom_entry(entry, self.kind())?;
        let identifier = entry.require_named(IDENTIFIER_FIELD.0, IDENTIFIER_FIELD.1)?;
        convert_with_identifier(entry, identifier.to_string(), identity)
    }
}

/// The Atom feed inside `feed`, or a contract error for `kind`
pub(crate) fn atom_feed(feed: &Feed, kind: SourceKind) -> Result<&AtomFeed> {
    match feed {
        Feed::Atom(atom) => Ok(atom),
        _ => Err(SourceError::UnexpectedFeed(kind.as_str()).into()),
    }
}

/// The Atom entry inside `entry`, or a contract error for `kind`
pub(crate) fn atom_entry(entry: &Entry, kind: SourceKind) -> Result<&AtomEntry> {
    match entry {
        Entry::Atom(atom) => Ok(atom),
        _ => Err(SourceError::UnexpectedEntry(kind.as_str()).into()),
    }
}

pub(crate) fn atom_entries(feed: &AtomFeed) -> Result<Vec<Entry>> {
    Ok(feed.entries.iter().cloned().map(Entry::Atom).collect())
}

/// The feed's pagination link, resolved against the page it came from
pub(crate) fn next_link(feed: &AtomFeed, cursor: &Cursor) -> Option<String> {
    feed.next_link().map(|href| resolve_link(cursor.url(), href))
}

/// Absolute links are returned unchanged; relative ones are joined onto `base`
pub fn resolve_link(base: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }

    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(e) => {
            tracing::warn!(base, href, error = %e, "Could not resolve relative next link");
            href.to_string()
        }
    }
}

/// Record with the given identifier, the entry's ingestion date, and the raw entry as content
pub(crate) fn convert_with_identifier(
    entry: &AtomEntry,
    identifier: String,
    identity: &HarvestIdentity,
) -> Result<NewRecord> {
    let ingestion_date = entry.require_named(INGESTION_DATE_FIELD.0, INGESTION_DATE_FIELD.1)?;

    tracing::debug!(identifier = %identifier, ingestion_date, "Found entry");
    Ok(identity.record(
        identifier,
        ingestion_date,
        Some(entry.raw().to_string()),
    ))
}
