//! Record types flowing through the pipeline.
//!
//! [`RawRecord`] is what the attribute readers deliver for one bibcode;
//! [`CanonicalRecord`] and [`MetricsRecord`] are what the sink receives.

use crate::error::{NonbibError, Result};
use crate::field::FieldValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Filetype carrying the bibcode itself
pub const CANONICAL: &str = "canonical";

/// Raw per-bibcode data, keyed by filetype, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, FieldValue)>,
}

impl RawRecord {
    /// Start a record holding only the canonical bibcode
    pub fn new(bibcode: &str) -> Self {
        let mut record = Self::default();
        record.insert(CANONICAL, FieldValue::Plain(Value::String(bibcode.to_string())));
        record
    }

    /// Build from a JSON object such as `{"canonical": "...", "reads": [..]}`
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(NonbibError::MissingField(CANONICAL.to_string()));
        };
        let mut record = Self::default();
        for (filetype, v) in map {
            record.insert(filetype, FieldValue::from_json(v));
        }
        if record.bibcode().is_none() {
            return Err(NonbibError::MissingField(CANONICAL.to_string()));
        }
        Ok(record)
    }

    /// Set a filetype's value, keeping its original position if already present
    pub fn insert(&mut self, filetype: impl Into<String>, value: FieldValue) {
        let filetype = filetype.into();
        match self.fields.iter_mut().find(|(k, _)| *k == filetype) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((filetype, value)),
        }
    }

    /// Builder form of [`RawRecord::insert`]
    pub fn with(mut self, filetype: &str, value: Value) -> Self {
        self.insert(filetype, FieldValue::from_json(value));
        self
    }

    pub fn get(&self, filetype: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == filetype).map(|(_, v)| v)
    }

    /// The canonical bibcode, if present and a string
    pub fn bibcode(&self) -> Option<&str> {
        match self.get(CANONICAL) {
            Some(FieldValue::Plain(Value::String(s))) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Number of authors, zero when the author list is absent
    pub fn author_count(&self) -> usize {
        self.get("author").map(FieldValue::list_len).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// One typed reference from a record to an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLinkRow {
    pub link_type: String,
    pub link_sub_type: String,
    /// Never empty; an empty string stands for "no url"
    pub url: Vec<String>,
    /// Never empty; an empty string stands for "no title"
    pub title: Vec<String>,
    pub item_count: u64,
}

/// Merged descriptive ("nonbib") record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub bibcode: String,
    /// Sorted, no duplicates
    pub property: Vec<String>,
    /// Sorted, no duplicates
    pub esource: Vec<String>,
    pub data_links_rows: Vec<DataLinkRow>,
    /// `"SUBTYPE:COUNT"` entries for DATA links, sorted
    pub data: Vec<String>,
    pub total_link_counts: u64,
    pub citation_count_norm: f64,
    /// Pass-through fields copied from the raw record
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Per-citation detail in a metrics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationDetail {
    /// Citing bibcode
    pub bibcode: String,
    pub ref_norm: f64,
    pub auth_norm: f64,
    pub pubyear: i32,
    pub cityear: i32,
}

/// Citation metrics for one bibcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub bibcode: String,
    pub an_citations: f64,
    pub an_refereed_citations: f64,
    pub author_num: u32,
    pub citation_num: u32,
    pub citations: Vec<String>,
    pub downloads: Vec<i64>,
    pub modtime: DateTime<Utc>,
    pub reads: Vec<i64>,
    pub refereed: bool,
    pub refereed_citations: Vec<String>,
    pub refereed_citation_num: u32,
    pub reference_num: u32,
    pub rn_citations: f64,
    pub rn_citation_data: Vec<CitationDetail>,
}
