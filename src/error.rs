//! Custom error types for rustnonbib.
//!
//! This module defines all error types used throughout the crate.
//! All functions return `Result<T, NonbibError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustnonbib operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum NonbibError {
    /// Bibcode does not start with a four digit year
    #[error("Invalid bibcode: {0:?}")]
    InvalidBibcode(String),

    /// A value required to build a record was not present
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A raw value has a shape its field definition cannot handle
    #[error("Malformed field {filetype} for {bibcode}: unexpected {observed} value {value}")]
    MalformedField {
        /// Bibcode being converted
        bibcode: String,
        /// Attribute source name
        filetype: String,
        /// Name of the observed value type
        observed: &'static str,
        /// Offending value, rendered as JSON
        value: String,
    },

    /// Field definition table is inconsistent
    #[error("Field definition error: {0}")]
    FieldDefinition(String),

    /// Citation snapshot input is unusable
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tab separated input error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using `NonbibError`
pub type Result<T> = std::result::Result<T, NonbibError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing field error
    fn ok_or_missing(self, field: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, field: &str) -> Result<T> {
        self.ok_or_else(|| NonbibError::MissingField(field.to_string()))
    }
}
