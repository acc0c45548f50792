//! Batch driver.
//!
//! Reads each bibcode, converts it, optionally computes its metrics and
//! hands the results to a sink in batches. A failure on one bibcode is
//! logged and recorded in the [`BatchReport`]; the batch carries on.

use crate::bibcode;
use crate::convert::Converter;
use crate::error::{NonbibError, Result};
use crate::field::FieldDefinitionTable;
use crate::metrics;
use crate::reader::RecordReader;
use crate::record::{CanonicalRecord, MetricsRecord, RawRecord};
use crate::sink::RecordSink;
use crate::snapshot::CitationIndex;
use chrono::{DateTime, Utc};
use std::io::BufRead;
use tracing::{error, info};

/// Processing options
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Compute a metrics record alongside each nonbib record
    pub compute_metrics: bool,
    /// Records per batch handed to the sink
    pub batch_size: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            compute_metrics: true,
            batch_size: 100,
        }
    }
}

/// Everything produced for one bibcode
#[derive(Debug)]
pub struct ProcessedRecord {
    pub nonbib: CanonicalRecord,
    pub metrics: Option<MetricsRecord>,
    /// Data-quality problems that did not stop the bibcode
    pub issues: Vec<NonbibError>,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Bibcodes whose records reached the sink
    pub processed: usize,
    /// Bibcodes dropped, with the reason
    pub failed: Vec<(String, String)>,
    /// Data-quality issues across all processed bibcodes
    pub issues: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.failed.extend(other.failed);
        self.issues += other.issues;
    }
}

/// Converts bibcodes against a fixed field table and citation snapshot
pub struct Processor<'a, I: CitationIndex + ?Sized> {
    converter: Converter<'a>,
    index: &'a I,
    options: ProcessorOptions,
}

impl<'a, I: CitationIndex + ?Sized> Processor<'a, I> {
    pub fn new(defs: &'a FieldDefinitionTable, index: &'a I, options: ProcessorOptions) -> Self {
        Self {
            converter: Converter::new(defs),
            index,
            options,
        }
    }

    /// Build the nonbib record and, if enabled, the metrics record for one bibcode
    pub fn process_record(&self, raw: &RawRecord, now: DateTime<Utc>) -> Result<ProcessedRecord> {
        let conversion = self.converter.convert(raw)?;
        let metrics = if self.options.compute_metrics {
            Some(metrics::compute(raw, self.index, now)?)
        } else {
            None
        };
        Ok(ProcessedRecord {
            nonbib: conversion.record,
            metrics,
            issues: conversion.issues,
        })
    }

    /// Process `bibcodes` in order, sending each batch to `sink`.
    ///
    /// # Errors
    ///
    /// Only sink failures abort the run; per-bibcode failures end up in
    /// [`BatchReport::failed`].
    pub fn process_bibcodes<R, S>(&self, reader: &R, bibcodes: &[String], sink: &mut S) -> Result<BatchReport>
    where
        R: RecordReader + ?Sized,
        S: RecordSink + ?Sized,
    {
        let mut report = BatchReport::default();
        let batch_size = self.options.batch_size.max(1);
        let batch_count = bibcodes.len().div_ceil(batch_size);

        info!(
            bibcodes = bibcodes.len(),
            batches = batch_count,
            compute_metrics = self.options.compute_metrics,
            "Starting batch run"
        );

        for (batch_idx, chunk) in bibcodes.chunks(batch_size).enumerate() {
            let mut nonbib_batch = Vec::with_capacity(chunk.len());
            let mut metrics_batch = Vec::with_capacity(chunk.len());

            for bibcode in chunk {
                let result = reader
                    .read(bibcode)
                    .and_then(|raw| self.process_record(&raw, Utc::now()));
                match result {
                    Ok(processed) => {
                        report.issues += processed.issues.len();
                        nonbib_batch.push(processed.nonbib);
                        metrics_batch.extend(processed.metrics);
                    }
                    Err(e) => {
                        error!(bibcode = %bibcode, error = %e, "Failed to process bibcode");
                        report.failed.push((bibcode.clone(), e.to_string()));
                    }
                }
            }

            report.processed += nonbib_batch.len();
            sink.accept_nonbib(nonbib_batch)?;
            if self.options.compute_metrics {
                sink.accept_metrics(metrics_batch)?;
            }

            info!(
                batch = batch_idx + 1,
                total_batches = batch_count,
                processed = report.processed,
                failed = report.failed.len(),
                "Batch completed"
            );
        }

        info!(
            processed = report.processed,
            failed = report.failed.len(),
            issues = report.issues,
            "Batch run complete"
        );
        Ok(report)
    }

    /// Process bibcodes as they arrive on `input`, one run per line.
    ///
    /// Each line may hold several space separated bibcodes; blank lines are
    /// skipped. The sink is flushed after every line.
    pub fn process_lines<R, S, B>(&self, reader: &R, input: B, sink: &mut S) -> Result<BatchReport>
    where
        R: RecordReader + ?Sized,
        S: RecordSink + ?Sized,
        B: BufRead,
    {
        let mut total = BatchReport::default();
        for line in input.lines() {
            let bibcodes = bibcode::parse_list(&line?);
            if bibcodes.is_empty() {
                continue;
            }
            let report = self.process_bibcodes(reader, &bibcodes, sink)?;
            sink.flush()?;
            total.absorb(report);
        }
        Ok(total)
    }
}
