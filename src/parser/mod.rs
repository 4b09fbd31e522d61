//! Feed parsing
//!
//! Turns a raw response body into a structured [`Feed`]. Which parser runs is
//! decided by the source adapter's [`FeedFormat`].

pub mod atom;
pub mod missing_dates;
pub mod selectors;

pub use atom::{parse_atom, AtomEntry, AtomFeed, EntryElement, FeedLink};
pub use missing_dates::parse_missing_dates;

use std::collections::HashSet;

use crate::utils::error::ParseError;

/// Wire format of a source's responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    /// Atom/OpenSearch XML result pages
    Atom,
    /// JSON array of `{"missingDate": ...}` objects
    MissingDates,
}

/// A parsed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    Atom(AtomFeed),
    MissingDates(HashSet<String>),
}

/// Parse `body` according to `format`
pub fn parse_feed(format: FeedFormat, body: &str) -> Result<Feed, ParseError> {
    match format {
        FeedFormat::Atom => parse_atom(body).map(Feed::Atom),
        FeedFormat::MissingDates => parse_missing_dates(body).map(Feed::MissingDates),
    }
}
