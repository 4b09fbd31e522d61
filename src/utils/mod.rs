//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod lock;
pub mod retry;
pub mod template;

use chrono::NaiveDate;

use crate::utils::error::ParseError;

/// Parse the `YYYY-MM-DD` prefix of a date or timestamp string
///
/// Source dates are zero-padded ISO strings, so the first ten characters are
/// the calendar date whether the value is `2023-01-15` or
/// `2023-01-15T10:00:00.000Z`.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, ParseError> {
    let prefix = value
        .get(..10)
        .ok_or_else(|| ParseError::InvalidDate(value.to_string()))?;

    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .map_err(|_| ParseError::InvalidDate(value.to_string()))
}
