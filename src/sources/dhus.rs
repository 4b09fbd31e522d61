//! DHuS (Copernicus Data Hub) catalogs
//!
//! Same feed shape as plain OpenSearch. DHuS sometimes drops the `orderby`
//! parameter when it builds the next-page link, which reorders the results
//! and breaks resumption from the largest stored ingestion date, so the
//! ordering is put back on every next link.

use url::Url;

use super::opensearch::{
    atom_entries, atom_entry, atom_feed, convert_with_identifier, next_link, IDENTIFIER_FIELD,
};
use super::{Cursor, Entry, SourceAdapter, SourceKind};
use crate::error::Result;
use crate::models::{HarvestIdentity, NewRecord};
use crate::parser::{Feed, FeedFormat};
use crate::utils::template::format_template;

/// Ordering parameter appended to next links that lack it
pub const ORDER_BY_INGESTION: &str = "&orderby=ingestiondate asc";

/// Default `{end_date}` value
pub const DEFAULT_END_DATE: &str = "NOW";

#[derive(Debug, Clone)]
pub struct DhusAdapter {
    url_template: String,
    end_date: String,
}

impl DhusAdapter {
    pub fn new(url_template: &str, end_date: Option<&str>) -> Self {
        Self {
            url_template: url_template.to_string(),
            end_date: end_date.unwrap_or(DEFAULT_END_DATE).to_string(),
        }
    }
}

impl SourceAdapter for DhusAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Dhus
    }

    fn feed_format(&self) -> FeedFormat {
        FeedFormat::Atom
    }

    fn start_cursor(&self, start_date: &str) -> Result<Cursor> {
        tracing::debug!(start_date, end_date = %self.end_date, "Building start cursor");
        let url = format_template(
            &self.url_template,
            &[("start_date", start_date), ("end_date", &self.end_date)],
        )?;
        Ok(Cursor::Link(url))
    }

    fn extract_entries(&self, feed: &Feed, _cursor: &Cursor) -> Result<Vec<Entry>> {
        atom_entries(atom_feed(feed, self.kind())?)
    }

    fn next_cursor(&self, feed: &Feed, cursor: &Cursor) -> Result<Option<Cursor>> {
        Ok(next_link(atom_feed(feed, self.kind())?, cursor)
            .map(add_orderby_if_missing)
            .map(Cursor::Link))
    }

    fn convert(&self, entry: &Entry, identity: &HarvestIdentity) -> Result<NewRecord> {
        let entry = atom_entry(entry, self.kind())?;
        let identifier = entry.require_named(IDENTIFIER_FIELD.0, IDENTIFIER_FIELD.1)?;
        convert_with_identifier(entry, identifier.to_string(), identity)
    }
}

/// Append [`ORDER_BY_INGESTION`] unless the link already asks for ascending ingestion order
pub fn add_orderby_if_missing(link: String) -> String {
    if requests_ingestion_order(&link) {
        link
    } else {
        tracing::debug!(link = %link, "Restoring ingestion date ordering on next link");
        link + ORDER_BY_INGESTION
    }
}

fn requests_ingestion_order(link: &str) -> bool {
    if link.contains(ORDER_BY_INGESTION) {
        return true;
    }

    Url::parse(link)
        .map(|url| {
            url.query_pairs().any(|(key, value)| {
                key.eq_ignore_ascii_case("orderby")
                    && value.trim().eq_ignore_ascii_case("ingestiondate asc")
            })
        })
        .unwrap_or(false)
}
