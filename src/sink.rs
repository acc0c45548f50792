//! Output sinks for finished records.
//!
//! Records arrive in batches; a sink never sees a record twice and never
//! hands anything back to the processor.

use crate::error::Result;
use crate::record::{CanonicalRecord, MetricsRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for nonbib records inside the output directory
pub const NONBIB_FILE: &str = "nonbib.jsonl";

/// File name for metrics records inside the output directory
pub const METRICS_FILE: &str = "metrics.jsonl";

/// Destination for finished record batches
pub trait RecordSink {
    fn accept_nonbib(&mut self, records: Vec<CanonicalRecord>) -> Result<()>;
    fn accept_metrics(&mut self, records: Vec<MetricsRecord>) -> Result<()>;

    /// Push buffered output to its destination
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects batches in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub nonbib: Vec<CanonicalRecord>,
    pub metrics: Vec<MetricsRecord>,
    /// Number of nonbib batches received
    pub batches: usize,
}

impl RecordSink for MemorySink {
    fn accept_nonbib(&mut self, records: Vec<CanonicalRecord>) -> Result<()> {
        self.batches += 1;
        self.nonbib.extend(records);
        Ok(())
    }

    fn accept_metrics(&mut self, records: Vec<MetricsRecord>) -> Result<()> {
        self.metrics.extend(records);
        Ok(())
    }
}

/// Writes one JSON object per line to `nonbib.jsonl` and `metrics.jsonl`
pub struct JsonLinesSink {
    dir: PathBuf,
    nonbib: BufWriter<File>,
    metrics: BufWriter<File>,
}

impl JsonLinesSink {
    /// Create (or truncate) both output files in `dir`
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            nonbib: BufWriter::new(File::create(dir.join(NONBIB_FILE))?),
            metrics: BufWriter::new(File::create(dir.join(METRICS_FILE))?),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSink for JsonLinesSink {
    fn accept_nonbib(&mut self, records: Vec<CanonicalRecord>) -> Result<()> {
        write_lines(&mut self.nonbib, &records)?;
        info!(count = records.len(), "Wrote nonbib batch");
        Ok(())
    }

    fn accept_metrics(&mut self, records: Vec<MetricsRecord>) -> Result<()> {
        write_lines(&mut self.metrics, &records)?;
        info!(count = records.len(), "Wrote metrics batch");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.nonbib.flush()?;
        self.metrics.flush()?;
        Ok(())
    }
}

fn write_lines<T: Serialize>(out: &mut BufWriter<File>, records: &[T]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
