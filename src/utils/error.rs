//! Error types for the harvester
//!
//! This module defines the domain-specific error types used throughout the
//! fetch, parse, persist and adapter layers.

use thiserror::Error;

/// Errors that can occur while fetching a feed page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection refused, body read failure, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Non-success status code
    #[error("Unexpected status {status} for {url}")]
    Status { status: u16, url: String },

    /// Cursor URL could not be used for a request
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// All attempts of the fetch retry policy failed
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

/// Errors that can occur while parsing a feed or reading fields from an entry
#[derive(Error, Debug)]
pub enum ParseError {
    /// Feed body is not a usable Atom/OpenSearch document
    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    /// Missing-dates body is not the expected JSON array
    #[error("Malformed JSON feed: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// A field the adapter needs is absent from an entry
    #[error("Missing field `{field}` in entry")]
    MissingField { field: String },

    /// A field is present but cannot be interpreted
    #[error("Malformed field `{field}`: {value:?}")]
    MalformedField { field: String, value: String },

    /// A date string is not an ISO `YYYY-MM-DD` date
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Errors raised by the item store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Contention or an internal store failure that is expected to clear
    #[error("Transient store error: {0}")]
    Transient(#[source] rusqlite::Error),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Filesystem error while preparing the store
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::InternalMalfunction
                | ErrorCode::SystemIoFailure,
            ) => Self::Transient(err),
            _ => Self::Database(err),
        }
    }
}

/// Adapter contract violations and adapter construction failures
#[derive(Error, Debug)]
pub enum SourceError {
    /// No adapter is registered under this name
    #[error("Unknown source kind: {0}")]
    UnknownSource(String),

    /// A configuration option the adapter requires is absent
    #[error("Source `{source_kind}` requires option `{option}`")]
    MissingOption {
        source_kind: &'static str,
        option: &'static str,
    },

    /// The parsed feed is of a shape the adapter cannot read
    #[error("Source `{0}` cannot read this kind of feed")]
    UnexpectedFeed(&'static str),

    /// The entry handed back to the adapter is not one it produced
    #[error("Source `{0}` cannot convert this kind of entry")]
    UnexpectedEntry(&'static str),

    /// The cursor handed back to the adapter is not one it produced
    #[error("Source `{0}` cannot continue from this kind of cursor")]
    UnexpectedCursor(&'static str),

    /// The URL template references a value the adapter does not supply
    #[error("URL template error: {0}")]
    Template(String),
}
