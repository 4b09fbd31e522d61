//! CSS selectors for Atom/OpenSearch feeds
//!
//! The tree builder case-folds names, so selectors are written in lower case.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    pub static ref FEED: Selector = parse_selector!("feed");
    pub static ref ENTRY: Selector = parse_selector!("entry");
    pub static ref LINK: Selector = parse_selector!("link");
    pub static ref ANY: Selector = parse_selector!("*");
}

/// Relation of the pagination link
pub const NEXT_REL: &str = "next";

/// Link type accepted for the pagination link (when a type is given)
pub const ATOM_TYPE: &str = "application/atom+xml";
