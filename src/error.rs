//! Unified error handling for the harvester crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`HarvesterErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_harvester::error::{Error, HarvesterErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, SourceError, StoreError};

/// Common trait for all harvester error types
///
/// The retry helper consults [`is_recoverable`](Self::is_recoverable) when a
/// policy only retries transient failures.
pub trait HarvesterErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, status)
    Network,
    /// Feed parsing and field extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Adapter contract and pagination errors
    Source,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Source => "source",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the harvester crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch errors (after the fetch retry policy gave up)
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Feed or entry parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Item store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Adapter errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The adapter handed back a cursor that was already fetched in this run
    #[error("Pagination loop detected: cursor {0} was already fetched in this run")]
    CursorRepeated(String),
}

impl HarvesterErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::RetriesExhausted { .. })
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl HarvesterErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl HarvesterErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl HarvesterErrorTrait for SourceError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownSource(_) | Self::MissingOption { .. } => ErrorCategory::Config,
            _ => ErrorCategory::Source,
        }
    }
}

impl HarvesterErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Source(e) => e.is_recoverable(),
            Self::CursorRepeated(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Source(e) => e.category(),
            Self::CursorRepeated(_) => ErrorCategory::Source,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
