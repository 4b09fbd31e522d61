//! VITO / ProbaV catalogs
//!
//! The entry identifier is a colon-delimited URN; the catalog-specific part is
//! its last two segments.

use super::opensearch::{atom_entries, atom_entry, atom_feed, convert_with_identifier, next_link};
use super::{Cursor, Entry, SourceAdapter, SourceKind};
use crate::error::Result;
use crate::models::{HarvestIdentity, NewRecord};
use crate::parser::{Feed, FeedFormat};
use crate::utils::error::ParseError;
use crate::utils::template::format_template;

/// Element holding the composite identifier
pub const IDENTIFIER_ELEMENT: &str = "identifier";

#[derive(Debug, Clone)]
pub struct ProbaVAdapter {
    url_template: String,
    end_date: String,
}

impl ProbaVAdapter {
    pub fn new(url_template: &str, end_date: Option<&str>) -> Self {
        Self {
            url_template: url_template.to_string(),
            end_date: end_date.unwrap_or_default().to_string(),
        }
    }
}

impl SourceAdapter for ProbaVAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::ProbaV
    }

    fn feed_format(&self) -> FeedFormat {
        FeedFormat::Atom
    }

    fn start_cursor(&self, start_date: &str) -> Result<Cursor> {
        tracing::debug!(start_date, "Building start cursor");
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
        Ok(next_link(atom_feed(feed, self.kind())?, cursor).map(Cursor::Link))
    }

    fn convert(&self, entry: &Entry, identity: &HarvestIdentity) -> Result<NewRecord> {
        let entry = atom_entry(entry, self.kind())?;
        let identifier = derive_identifier(entry.require_text(IDENTIFIER_ELEMENT)?)?;
        convert_with_identifier(entry, identifier, identity)
    }
}

/// Join the last two colon-delimited segments with `_`
///
/// `"a:b:C:D"` becomes `"C_D"`.
pub fn derive_identifier(full_identifier: &str) -> std::result::Result<String, ParseError> {
    let mut segments = full_identifier.rsplit(':');

    match (segments.next(), segments.next()) {
        (Some(last), Some(second_last)) if !last.is_empty() && !second_last.is_empty() => {
            Ok(format!("{second_last}_{last}"))
        }
        _ => Err(ParseError::MalformedField {
            field: IDENTIFIER_ELEMENT.to_string(),
            value: full_identifier.to_string(),
        }),
    }
}
