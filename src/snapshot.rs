//! Global citation snapshot.
//!
//! Citation, reference and refereed data for the whole corpus, built once
//! before any bibcode is processed and only read afterwards. The metrics
//! computer sees it through the [`CitationIndex`] trait.

use crate::error::{NonbibError, Result};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Read access to corpus-wide citation data
pub trait CitationIndex {
    /// Bibcodes citing `bibcode`, empty if none
    fn citing(&self, bibcode: &str) -> &[String];
    /// Bibcodes referenced by `bibcode`, empty if none
    fn referenced(&self, bibcode: &str) -> &[String];
    fn is_refereed(&self, bibcode: &str) -> bool;
}

/// Immutable citation snapshot
#[derive(Debug, Clone, Default)]
pub struct CitationSnapshot {
    citations: HashMap<String, Vec<String>>,
    references: HashMap<String, Vec<String>>,
    refereed: HashSet<String>,
}

impl CitationSnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Load from a tab separated `citing<TAB>cited` file and an optional
    /// one-bibcode-per-line refereed list.
    pub fn from_files(references: &Path, refereed: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder();
        builder.read_references(std::fs::File::open(references)?)?;
        if let Some(path) = refereed {
            builder.read_refereed(std::fs::File::open(path)?)?;
        }
        let snapshot = builder.build();
        info!(
            cited = snapshot.citations.len(),
            citing = snapshot.references.len(),
            refereed = snapshot.refereed.len(),
            "Citation snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Number of distinct bibcodes with at least one reference
    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty() && self.refereed.is_empty()
    }
}

impl CitationIndex for CitationSnapshot {
    fn citing(&self, bibcode: &str) -> &[String] {
        self.citations.get(bibcode).map(Vec::as_slice).unwrap_or(&[])
    }

    fn referenced(&self, bibcode: &str) -> &[String] {
        self.references.get(bibcode).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_refereed(&self, bibcode: &str) -> bool {
        self.refereed.contains(bibcode)
    }
}

/// Accumulates snapshot data; the only way to build a [`CitationSnapshot`]
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    pairs: HashSet<(String, String)>,
    snapshot: CitationSnapshot,
}

impl SnapshotBuilder {
    /// Record that `citing` references `cited`. Repeated pairs are ignored.
    pub fn add_reference(&mut self, citing: &str, cited: &str) -> &mut Self {
        if self.pairs.insert((citing.to_string(), cited.to_string())) {
            self.snapshot
                .references
                .entry(citing.to_string())
                .or_default()
                .push(cited.to_string());
            self.snapshot
                .citations
                .entry(cited.to_string())
                .or_default()
                .push(citing.to_string());
        }
        self
    }

    pub fn add_refereed(&mut self, bibcode: &str) -> &mut Self {
        self.snapshot.refereed.insert(bibcode.to_string());
        self
    }

    /// Read `citing<TAB>cited` pairs
    pub fn read_references<R: Read>(&mut self, input: R) -> Result<&mut Self> {
        let mut reader = tsv_reader(input);
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            match (record.get(0), record.get(1)) {
                (Some(citing), Some(cited)) if !citing.is_empty() && !cited.is_empty() => {
                    self.add_reference(citing.trim(), cited.trim());
                }
                _ => {
                    return Err(NonbibError::Snapshot(format!(
                        "reference line {} needs two bibcodes",
                        line + 1
                    )));
                }
            }
        }
        Ok(self)
    }

    /// Read refereed bibcodes, one per line; extra columns are ignored
    pub fn read_refereed<R: Read>(&mut self, input: R) -> Result<&mut Self> {
        let mut reader = tsv_reader(input);
        for result in reader.records() {
            let record = result?;
            match record.get(0).map(str::trim) {
                Some(bibcode) if !bibcode.is_empty() => {
                    self.add_refereed(bibcode);
                }
                _ => warn!("Skipping empty refereed line"),
            }
        }
        Ok(self)
    }

    pub fn build(self) -> CitationSnapshot {
        self.snapshot
    }
}

fn tsv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input)
}
