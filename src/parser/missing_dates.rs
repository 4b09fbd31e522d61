//! "Missing dates" JSON responses used by gap detection

use serde::Deserialize;
use std::collections::HashSet;

use crate::utils::error::ParseError;

#[derive(Debug, Deserialize)]
struct MissingDate {
    #[serde(rename = "missingDate")]
    missing_date: String,
}

/// Parse a JSON array of `{"missingDate": "YYYY-MM-DD"}` objects into a set of dates
pub fn parse_missing_dates(body: &str) -> Result<HashSet<String>, ParseError> {
    let dates: Vec<MissingDate> = serde_json::from_str(body)?;

    Ok(dates
        .into_iter()
        .map(|d| d.missing_date.trim().to_string())
        .collect())
}
