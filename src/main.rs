//! rustnonbib - nonbib and metrics record builder
//!
//! Converts bibcode-keyed attribute data into nonbib records and citation
//! metrics records.
//!
//! ## Usage
//!
//! ```bash
//! rustnonbib process --records raw.jsonl --references refs.tsv --refereed refereed.list
//! rustnonbib process --records raw.jsonl --no-metrics --bibcodes "2020ApJ...900..100X"
//! rustnonbib process --records raw.jsonl --references refs.tsv --interactive
//! rustnonbib fields
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustnonbib::reader::JsonLinesReader;
use rustnonbib::sink::{JsonLinesSink, RecordSink};
use rustnonbib::{bibcode, BatchReport, CitationSnapshot, FieldDefinitionTable, Processor, ProcessorOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Nonbib and citation metrics record builder
#[derive(Parser)]
#[command(name = "rustnonbib")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build nonbib (and metrics) records
    Process {
        /// Raw records, one JSON object per line
        #[arg(long)]
        records: PathBuf,

        /// Field definition table (JSON); the built-in table is used if omitted
        #[arg(long)]
        field_defs: Option<PathBuf>,

        /// Tab separated citing/cited bibcode pairs
        #[arg(long)]
        references: Option<PathBuf>,

        /// Refereed bibcodes, one per line
        #[arg(long)]
        refereed: Option<PathBuf>,

        /// Space separated bibcodes to process (default: every record)
        #[arg(short, long)]
        bibcodes: Option<String>,

        /// Read bibcodes from stdin, one line at a time, after loading everything once
        #[arg(short, long, conflicts_with = "bibcodes")]
        interactive: bool,

        /// Skip metrics computation
        #[arg(long)]
        no_metrics: bool,

        /// Records per output batch
        #[arg(long, default_value = "100")]
        batch_size: usize,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// Print the effective field definition table
    Fields {
        /// Field definition table (JSON); the built-in table is used if omitted
        #[arg(long)]
        field_defs: Option<PathBuf>,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Process {
            records,
            field_defs,
            references,
            refereed,
            bibcodes,
            interactive,
            no_metrics,
            batch_size,
            output,
        } => run_process(
            records,
            field_defs,
            references,
            refereed,
            bibcodes,
            interactive,
            ProcessorOptions {
                compute_metrics: !no_metrics,
                batch_size,
            },
            output,
        ),
        Commands::Fields { field_defs } => print_fields(field_defs.as_deref()),
    }
}

// ============================================================================
// Processing
// ============================================================================

fn run_process(
    records: PathBuf,
    field_defs: Option<PathBuf>,
    references: Option<PathBuf>,
    refereed: Option<PathBuf>,
    bibcodes: Option<String>,
    interactive: bool,
    options: ProcessorOptions,
    output: PathBuf,
) -> Result<()> {
    let defs = load_field_defs(field_defs.as_deref())?;

    // The snapshot is complete before the first bibcode is touched
    let snapshot = if options.compute_metrics {
        let references = references
            .as_deref()
            .context("--references is required unless --no-metrics is given")?;
        CitationSnapshot::from_files(references, refereed.as_deref())
            .context("Failed to load citation snapshot")?
    } else {
        CitationSnapshot::default()
    };
    println!("Citation snapshot ready ({} citing bibcodes)", snapshot.len());

    let reader = JsonLinesReader::from_path(&records)
        .with_context(|| format!("Failed to read records from {}", records.display()))?;

    if interactive {
        let mut sink = JsonLinesSink::create(&output).context("Failed to create output files")?;
        let processor = Processor::new(&defs, &snapshot, options);

        println!("Enter bibcodes, one line at a time (Ctrl-D to finish):");
        let report = processor
            .process_lines(&reader, io::stdin().lock(), &mut sink)
            .context("Interactive processing failed")?;
        return print_summary(&report, &sink);
    }

    let bibcodes = match bibcodes {
        Some(list) => bibcode::parse_list(&list),
        None => reader.bibcodes(),
    };
    if bibcodes.is_empty() {
        println!("No bibcodes to process.");
        return Ok(());
    }

    let mut sink = JsonLinesSink::create(&output).context("Failed to create output files")?;
    let processor = Processor::new(&defs, &snapshot, options);

    println!("Processing {} bibcodes...", bibcodes.len());
    let report = processor
        .process_bibcodes(&reader, &bibcodes, &mut sink)
        .context("Failed to write output batch")?;
    sink.flush().context("Failed to flush output")?;
    print_summary(&report, &sink)
}

fn print_summary(report: &BatchReport, sink: &JsonLinesSink) -> Result<()> {
    for (bibcode, reason) in &report.failed {
        println!("  failed: {} ({})", bibcode, reason);
    }
    println!(
        "\n✓ Processed {} bibcodes ({} failed, {} data quality issues). Results in: {}",
        report.processed,
        report.failed.len(),
        report.issues,
        sink.dir().display()
    );
    Ok(())
}

fn load_field_defs(path: Option<&Path>) -> Result<FieldDefinitionTable> {
    let defs = match path {
        Some(path) => FieldDefinitionTable::from_path(path)
            .with_context(|| format!("Failed to load field definitions from {}", path.display()))?,
        None => FieldDefinitionTable::builtin().context("Built-in field definitions are invalid")?,
    };
    info!(fields = defs.len(), "Field definitions ready");
    Ok(defs)
}

fn print_fields(path: Option<&Path>) -> Result<()> {
    let defs = load_field_defs(path)?;
    let json = serde_json::to_string_pretty(&defs).context("Failed to render field definitions")?;
    println!("{}", json);
    Ok(())
}
