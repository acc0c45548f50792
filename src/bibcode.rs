//! Bibcode helpers.
//!
//! A bibcode is a fixed format 19 character identifier whose first four
//! characters are the publication year, e.g. `2020ApJ...900..100X`.

use crate::error::{NonbibError, Result};
use regex::Regex;
use std::sync::LazyLock;

static YEAR_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^(\d{4})").ok());

/// Extract the publication year from the leading four characters.
///
/// # Errors
///
/// Returns `NonbibError::InvalidBibcode` if the bibcode does not start with four digits.
pub fn year(bibcode: &str) -> Result<i32> {
    YEAR_PREFIX
        .as_ref()
        .and_then(|re| re.captures(bibcode))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| NonbibError::InvalidBibcode(bibcode.to_string()))
}

/// Split a whitespace separated bibcode list, sorted and deduplicated.
pub fn parse_list(input: &str) -> Vec<String> {
    let mut bibcodes: Vec<String> = input.split_whitespace().map(str::to_string).collect();
    bibcodes.sort();
    bibcodes.dedup();
    bibcodes
}
