//! Atom/OpenSearch feed parsing
//!
//! Catalog responses are parsed with a lenient tree builder so that minor
//! markup problems in upstream feeds do not abort a harvest. The parsed feed
//! is fully owned: entries keep their outer markup plus a flat list of their
//! descendant elements for field lookups.

use scraper::{ElementRef, Html};

use super::selectors::{ANY, ATOM_TYPE, ENTRY, FEED, LINK, NEXT_REL};
use crate::utils::error::ParseError;

/// Feed-level `<link>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLink {
    pub rel: Option<String>,
    pub link_type: Option<String>,
    pub href: String,
}

/// One descendant element of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryElement {
    /// Lower-cased tag name
    pub tag: String,
    /// Value of the `name` attribute, as used by OpenSearch `<str name="...">` fields
    pub name: Option<String>,
    /// Trimmed text content
    pub text: String,
}

/// One `<entry>` of a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomEntry {
    raw: String,
    elements: Vec<EntryElement>,
}

impl AtomEntry {
    fn from_element(entry: ElementRef<'_>) -> Self {
        let elements = entry
            .select(&ANY)
            .map(|el| EntryElement {
                tag: el.value().name().to_string(),
                name: el.value().attr("name").map(str::to_string),
                text: el.text().collect::<String>().trim().to_string(),
            })
            .collect();

        Self {
            raw: entry.html(),
            elements,
        }
    }

    /// Outer markup of the entry
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Text of the first `<tag name="name">` element
    pub fn named(&self, tag: &str, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|el| el.tag == tag && el.name.as_deref() == Some(name))
            .map(|el| el.text.as_str())
    }

    /// Text of the first `<tag>` element
    pub fn text_of(&self, tag: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|el| el.tag == tag)
            .map(|el| el.text.as_str())
    }

    /// Like [`named`](Self::named), failing when the field is absent or empty
    pub fn require_named(&self, tag: &str, name: &str) -> Result<&str, ParseError> {
        self.named(tag, name)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ParseError::MissingField {
                field: format!("{tag}[name={name}]"),
            })
    }

    /// Like [`text_of`](Self::text_of), failing when the field is absent or empty
    pub fn require_text(&self, tag: &str) -> Result<&str, ParseError> {
        self.text_of(tag)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ParseError::MissingField {
                field: tag.to_string(),
            })
    }
}

/// Parsed Atom/OpenSearch result page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomFeed {
    pub entries: Vec<AtomEntry>,
    pub links: Vec<FeedLink>,
}

impl AtomFeed {
    /// `href` of the feed's pagination link, if any
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| {
                link.rel.as_deref() == Some(NEXT_REL)
                    && link.link_type.as_deref().map_or(true, |t| t == ATOM_TYPE)
            })
            .map(|link| link.href.as_str())
            .filter(|href| !href.is_empty())
    }
}

/// Parse an Atom/OpenSearch document
pub fn parse_atom(body: &str) -> Result<AtomFeed, ParseError> {
    let document = Html::parse_document(body);

    if document.select(&FEED).next().is_none() {
        return Err(ParseError::MalformedFeed(
            "document has no <feed> element".to_string(),
        ));
    }

    let entries = document
        .select(&ENTRY)
        .map(AtomEntry::from_element)
        .collect();

    let links = document
        .select(&LINK)
        .filter(|link| !inside_entry(*link))
        .filter_map(|link| {
            let value = link.value();
            Some(FeedLink {
                rel: value.attr("rel").map(|r| r.trim().to_ascii_lowercase()),
                link_type: value.attr("type").map(|t| t.trim().to_ascii_lowercase()),
                href: value.attr("href")?.trim().to_string(),
            })
        })
        .collect();

    Ok(AtomFeed { entries, links })
}

fn inside_entry(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "entry")
}
