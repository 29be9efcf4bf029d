//! # Sheetpipe
//!
//! A **batch ETL engine** that streams spreadsheet rows into relational tables.
//! Sheetpipe reads one sheet of an `.xlsx`/`.xls` workbook row by row, maps
//! header columns onto the fields of a destination table, fills gaps from
//! defaults and value generators, and writes the result in fixed-size
//! batches inside a single transaction.
//!
//! ## Key Features
//!
//! - **Streaming runs** - one record at a time from source to batch, never the whole sheet
//! - **Schema-aware mapping** - header names matched against table metadata, with required-field enforcement
//! - **Defaults and generators** - fill missing values from constants, Snowflake ids, UUIDs, or timestamps
//! - **Record-level failures** - bad rows are counted and reported, the run carries on
//! - **All-or-nothing writes** - a failed batch rolls back everything the run wrote
//! - **Pluggable stages** - add your own [`Processor`](processor::Processor)s and [`Validator`](validation::Validator)s
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetpipe::generator::ValueGeneratorRegistry;
//! use sheetpipe::{ImportConfig, Importer};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = Arc::new(ValueGeneratorRegistry::with_builtins());
//! let importer = Importer::new("warehouse.db", registry);
//!
//! let mut config = ImportConfig::for_table("orders");
//! config.generators.insert("ORDER_ID".into(), "snowflake".into());
//! config.batch_size = 500;
//!
//! let report = importer.import_file("orders.xlsx", &config);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Building a Pipeline by Hand
//!
//! The [`Importer`] is a convenience over the lower-level pieces, which can be
//! combined directly:
//!
//! ```no_run
//! use sheetpipe::mapping::FieldMapper;
//! use sheetpipe::pipeline::Pipeline;
//! use sheetpipe::processor::RowMappingProcessor;
//! use sheetpipe::sink::{SqliteSink, WriteMode};
//! use sheetpipe::source::{Source, SpreadsheetSource};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut source = SpreadsheetSource::new("orders.xlsx").skip_header(true);
//! source.open()?;
//!
//! let mut mapper = FieldMapper::new(true);
//! mapper.add_mapping("Order No", "ID", true);
//! mapper.add_mapping_with_default("Status", "STATUS", false, "NEW");
//! let index = mapper.build_column_index(&source.header()?);
//!
//! let sink = SqliteSink::new("warehouse.db", "orders", WriteMode::Insert);
//! let mut pipeline = Pipeline::new(source, sink)
//!     .processor(RowMappingProcessor::new(mapper, index, 1))
//!     .batch_size(100);
//!
//! let result = pipeline.run()?;
//! println!("{} ok, {} failed", result.success_records, result.failure_records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `timestamp-generator` (default) - register the `timestamp` value generator
//! - `cli` - build the `sheetpipe` command-line tool
//!
//! ## Module Overview
//!
//! - [`pipeline`] - Run orchestration, state machine and results
//! - [`source`] - Spreadsheet and in-memory record sources, cell normalization
//! - [`mapping`] - Column-to-field mappings and mapper construction from table metadata
//! - [`processor`] - Processor stages and the chain that runs them
//! - [`validation`] - Validators as a processor stage
//! - [`sink`] - SQLite batch writer and statement builders
//! - [`schema`] - Destination table metadata
//! - [`generator`] - Value generators and their registry
//! - [`import`] - The import service and its reports
//! - [`testing`] - Utilities for testing pipelines

pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod import;
pub mod listener;
pub mod mapping;
pub mod pipeline;
pub mod processor;
pub mod schema;
pub mod sink;
pub mod source;
pub mod testing;
pub mod validation;
pub mod value;

// General re-exports
pub use config::{ExtraField, ImportConfig, ImportMode};
pub use context::ProcessContext;
pub use error::{EtlError, Result};
pub use generator::{ValueGenerator, ValueGeneratorRegistry};
pub use import::{ImportReport, ImportRowError, Importer};
pub use listener::{PipelineListener, TracingListener};
pub use mapping::{FieldMapper, FieldMapping};
pub use pipeline::{Pipeline, PipelineFailure, PipelineResult, PipelineState};
pub use processor::{Processor, ProcessorChain};
pub use sink::{Sink, SqliteSink, WriteMode};
pub use source::{Cell, Record, Row, Source, SpreadsheetSource};
pub use value::{FieldMap, Value, ValueKind};
