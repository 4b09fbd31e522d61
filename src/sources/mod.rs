//! Source adapters
//!
//! A [`SourceAdapter`] supplies everything catalog-specific to the generic
//! harvest loop: the first cursor for a start date, the entries of a parsed
//! page, the cursor of the following page, and the conversion of one entry
//! into a record. The engine only ever sees `dyn SourceAdapter`.
//!
//! Adapters are looked up through the static [`SourceKind`] registry:
//!
//! | kind         | feed                | pagination                          |
//! |--------------|---------------------|-------------------------------------|
//! | `opensearch` | Atom/OpenSearch XML | feed `link[rel=next]`               |
//! | `dhus`       | Atom/OpenSearch XML | `link[rel=next]` + ordering fix     |
//! | `probav`     | Atom/OpenSearch XML | `link[rel=next]`                    |
//! | `gome2`      | missing-dates JSON  | calendar month windows up to today  |

pub mod dhus;
pub mod gome2;
pub mod opensearch;
pub mod probav;

pub use dhus::DhusAdapter;
pub use gome2::Gome2Adapter;
pub use opensearch::OpenSearchAdapter;
pub use probav::ProbaVAdapter;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::models::{HarvestIdentity, NewRecord};
use crate::parser::{AtomEntry, Feed, FeedFormat};
use crate::utils::error::SourceError;

/// Where the next fetch resumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// A fetchable result-page URL
    Link(String),
    /// A gap-detection window starting at `start_date`, fetched at `url`
    Window { start_date: NaiveDate, url: String },
}

impl Cursor {
    /// URL to fetch for this cursor
    pub fn url(&self) -> &str {
        match self {
            Self::Link(url) => url,
            Self::Window { url, .. } => url,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(url) => write!(f, "{url}"),
            Self::Window { start_date, url } => write!(f, "{start_date} ({url})"),
        }
    }
}

/// One raw entry extracted from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// An Atom `<entry>` element
    Atom(AtomEntry),
    /// A date with products, as found by gap detection
    Date(String),
}

/// Catalog-specific policy for the harvest loop
pub trait SourceAdapter: Send + Sync {
    /// Registry kind of this adapter
    fn kind(&self) -> SourceKind;

    /// Wire format of the responses this adapter reads
    fn feed_format(&self) -> FeedFormat;

    /// Cursor of the first page for a resumption date
    fn start_cursor(&self, start_date: &str) -> Result<Cursor>;

    /// Entries found on a parsed page
    fn extract_entries(&self, feed: &Feed, cursor: &Cursor) -> Result<Vec<Entry>>;

    /// Cursor of the page after `cursor`, or `None` when the run is complete
    fn next_cursor(&self, feed: &Feed, cursor: &Cursor) -> Result<Option<Cursor>>;

    /// Convert one entry into a record for `identity`
    fn convert(&self, entry: &Entry, identity: &HarvestIdentity) -> Result<NewRecord>;
}

/// Adapter construction options, taken from the harvester configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub url_template: String,
    pub end_date: Option<String>,
    pub coverage: Option<String>,
    /// "Today" for gap detection
    pub today: NaiveDate,
}

impl SourceOptions {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            end_date: None,
            coverage: None,
            today: Utc::now().date_naive(),
        }
    }

    #[must_use]
    pub fn end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    #[must_use]
    pub fn coverage(mut self, coverage: impl Into<String>) -> Self {
        self.coverage = Some(coverage.into());
        self
    }

    #[must_use]
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Static registry of adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceKind {
    OpenSearch,
    Dhus,
    ProbaV,
    Gome2,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [Self::OpenSearch, Self::Dhus, Self::ProbaV, Self::Gome2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenSearch => "opensearch",
            Self::Dhus => "dhus",
            Self::ProbaV => "probav",
            Self::Gome2 => "gome2",
        }
    }

    /// Build the adapter registered under this kind
    pub fn build(self, options: &SourceOptions) -> Result<Box<dyn SourceAdapter>> {
        let adapter: Box<dyn SourceAdapter> = match self {
            Self::OpenSearch => Box::new(OpenSearchAdapter::new(&options.url_template)),
            Self::Dhus => Box::new(DhusAdapter::new(
                &options.url_template,
                options.end_date.as_deref(),
            )),
            Self::ProbaV => Box::new(ProbaVAdapter::new(
                &options.url_template,
                options.end_date.as_deref(),
            )),
            Self::Gome2 => {
                let coverage = options.coverage.as_deref().ok_or(SourceError::MissingOption {
                    source_kind: self.as_str(),
                    option: "coverage",
                })?;
                Box::new(Gome2Adapter::new(&options.url_template, coverage, options.today))
            }
        };

        Ok(adapter)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    /// Accepts registry names and the harvester class names of older configs
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opensearch" | "opensearchharvester" | "opensearch_harvester" => Ok(Self::OpenSearch),
            "dhus" | "dhusharvester" | "dhus_harvester" => Ok(Self::Dhus),
            "probav" | "probavharvester" | "probav_harvester" => Ok(Self::ProbaV),
            "gome2" | "gome2harvester" | "gome2_harvester" => Ok(Self::Gome2),
            _ => Err(SourceError::UnknownSource(s.to_string())),
        }
    }
}

impl TryFrom<String> for SourceKind {
    type Error = SourceError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}
