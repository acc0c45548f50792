//! Raw record input.
//!
//! The attribute readers themselves live outside this crate; what they
//! produce is consumed through [`RecordReader`]. [`JsonLinesReader`] serves
//! records from a file holding one JSON object per bibcode.

use crate::error::{NonbibError, Result};
use crate::record::RawRecord;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Source of raw per-bibcode data
pub trait RecordReader {
    /// Read every filetype value for `bibcode`
    fn read(&self, bibcode: &str) -> Result<RawRecord>;
}

/// In-memory records loaded from a JSON-lines file
#[derive(Debug, Default)]
pub struct JsonLinesReader {
    records: HashMap<String, RawRecord>,
}

impl JsonLinesReader {
    /// Load every line of `path`; blank lines are skipped
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = Self::from_reader(BufReader::new(file))?;
        info!(path = ?path, records = reader.len(), "Loaded raw records");
        Ok(reader)
    }

    pub fn from_reader<R: BufRead>(input: R) -> Result<Self> {
        let mut records = HashMap::new();
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = RawRecord::from_json(serde_json::from_str(&line)?)?;
            let bibcode = record.bibcode().map(str::to_string).unwrap_or_default();
            if records.insert(bibcode.clone(), record).is_some() {
                warn!(bibcode = %bibcode, "Duplicate record, keeping the later one");
            }
        }
        Ok(Self { records })
    }

    /// All bibcodes, sorted
    pub fn bibcodes(&self) -> Vec<String> {
        let mut bibcodes: Vec<String> = self.records.keys().cloned().collect();
        bibcodes.sort();
        bibcodes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordReader for JsonLinesReader {
    fn read(&self, bibcode: &str) -> Result<RawRecord> {
        self.records
            .get(bibcode)
            .cloned()
            .ok_or_else(|| NonbibError::MissingField(format!("no raw record for {}", bibcode)))
    }
}
