//! # rustnonbib
//!
//! Builds nonbib and citation metrics records from bibcode-keyed attribute data.
//!
//! ## Modules
//!
//! - [`field`] - Raw field values and the field definition table
//! - [`convert`] - Raw record to canonical (nonbib) record conversion
//! - [`datalinks`] - Data link row building, merging and summary
//! - [`metrics`] - Citation metrics computation
//! - [`snapshot`] - Global citation/reference/refereed snapshot
//! - [`processor`] - Batch driver with per-bibcode failure isolation
//! - [`reader`] / [`sink`] - Record input and output
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustnonbib::{FieldDefinitionTable, CitationSnapshot, Processor, ProcessorOptions, RawRecord};
//!
//! fn main() -> rustnonbib::Result<()> {
//!     let defs = FieldDefinitionTable::builtin()?;
//!     let snapshot = CitationSnapshot::default();
//!     let processor = Processor::new(&defs, &snapshot, ProcessorOptions::default());
//!     let raw = RawRecord::new("2020ApJ...900..100X");
//!     let processed = processor.process_record(&raw, chrono::Utc::now())?;
//!     println!("{:?}", processed.nonbib.property);
//!     Ok(())
//! }
//! ```

pub mod bibcode;
pub mod convert;
pub mod datalinks;
pub mod error;
pub mod field;
pub mod metrics;
pub mod processor;
pub mod reader;
pub mod record;
pub mod sink;
pub mod snapshot;

pub use convert::{Conversion, Converter};
pub use error::{NonbibError, Result};
pub use field::{ExtraValues, FieldDefinition, FieldDefinitionTable, FieldValue};
pub use processor::{BatchReport, ProcessedRecord, Processor, ProcessorOptions};
pub use record::{CanonicalRecord, CitationDetail, DataLinkRow, MetricsRecord, RawRecord};
pub use snapshot::{CitationIndex, CitationSnapshot};
