//! Query-string validation shared by the sources.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::SourceError;

pub const DEFAULT_LIMIT: usize = 25;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_ZIP: &str = "48103";

static ZIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{5}$").expect("Invalid zip pattern"));

/// Query parameters for the location-based feeds
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationParams {
    /// Five-digit US ZIP code (default 48103)
    pub location: Option<String>,
}

/// Treat an empty or blank parameter as absent.
pub fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse `limit`, which must be an integer in `1..=100`.
pub fn parse_limit(raw: Option<String>) -> crate::Result<usize> {
    let Some(raw) = non_empty(raw) else {
        return Ok(DEFAULT_LIMIT);
    };
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        _ => Err(SourceError::Validation(format!(
            "limit must be an integer between 1 and {}",
            MAX_LIMIT
        ))),
    }
}

/// Parse a five-digit ZIP code, defaulting to central Ann Arbor.
pub fn parse_zip(raw: Option<String>) -> crate::Result<String> {
    let Some(raw) = non_empty(raw) else {
        return Ok(DEFAULT_ZIP.to_string());
    };
    if ZIP.is_match(&raw) {
        Ok(raw)
    } else {
        Err(SourceError::Validation(
            "location must be a 5-digit ZIP code".to_string(),
        ))
    }
}

/// Parse an optional non-negative integer parameter.
pub fn parse_count(name: &str, raw: Option<String>) -> crate::Result<Option<u64>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| SourceError::Validation(format!("{} must be a non-negative integer", name))),
    }
}

/// Reject a `min`/`max` pair whose lower bound exceeds the upper one.
pub fn check_range(name: &str, min: Option<u64>, max: Option<u64>) -> crate::Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(SourceError::Validation(format!(
            "min{} must not exceed max{}",
            name, name
        ))),
        _ => Ok(()),
    }
}
