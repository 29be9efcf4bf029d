//! The import service: one spreadsheet file into one table.
//!
//! [`Importer`] wires the pieces of a run together. For each file it reads
//! the destination table's metadata, opens the sheet, builds a
//! [`FieldMapper`](crate::mapping::FieldMapper) from the header row and the
//! [`ImportConfig`], and drives a [`Pipeline`] into a [`SqliteSink`]. Every
//! outcome, including configuration and open failures, comes back as an
//! [`ImportReport`].
//!
//! # Example
//!
//! ```no_run
//! use sheetpipe::generator::ValueGeneratorRegistry;
//! use sheetpipe::{ImportConfig, Importer};
//! use std::sync::Arc;
//!
//! let importer = Importer::new("warehouse.db", Arc::new(ValueGeneratorRegistry::with_builtins()));
//! let report = importer.import_file("orders.xlsx", &ImportConfig::for_table("orders"));
//!
//! println!("{}: {} of {} rows", report.message, report.success_records, report.total_records);
//! assert!(importer.report(report.task_id).is_some());
//! ```

use crate::config::ImportConfig;
use crate::error::{EtlError, Result};
use crate::generator::{GeneratorDescriptor, ValueGeneratorRegistry};
use crate::listener::TracingListener;
use crate::mapping::FieldMapper;
use crate::mapping::auto::build_mapper;
use crate::pipeline::{ErrorRecord, Pipeline, PipelineResult};
use crate::processor::RowMappingProcessor;
use crate::schema::{SchemaProvider, SqliteSchemaProvider, TableStructure};
use crate::sink::SqliteSink;
use crate::source::{Source, SpreadsheetSource};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// One failed row in an [`ImportReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowError {
    /// 1-based sheet row.
    pub row_number: usize,
    pub message: String,
    /// The row's cells as read from the sheet.
    pub row_data: String,
}

impl From<&ErrorRecord> for ImportRowError {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            row_number: record.row_number(),
            message: record.message.clone(),
            row_data: record.source.describe(),
        }
    }
}

/// Outcome of importing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub task_id: Uuid,
    /// The file this report is about.
    pub file: String,
    pub table_name: String,
    pub total_records: usize,
    pub success_records: usize,
    pub failure_records: usize,
    pub skipped_records: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    fn started(file: &Path, table: &str) -> Self {
        let now = Utc::now();
        Self {
            success: false,
            message: String::new(),
            task_id: Uuid::new_v4(),
            file: file.display().to_string(),
            table_name: table.to_string(),
            total_records: 0,
            success_records: 0,
            failure_records: 0,
            skipped_records: 0,
            started_at: now,
            finished_at: now,
            elapsed_ms: 0,
            errors: Vec::new(),
        }
    }

    fn absorb(&mut self, result: &PipelineResult) {
        self.total_records = result.total_records;
        self.success_records = result.success_records;
        self.failure_records = result.failure_records;
        self.skipped_records = result.skipped_records;
        self.errors = result.errors.iter().map(ImportRowError::from).collect();
    }
}

/// Imports spreadsheet files into tables of one SQLite database.
///
/// The generator registry is shared across runs; every run opens its own
/// connection and transaction.
pub struct Importer {
    database: PathBuf,
    registry: Arc<ValueGeneratorRegistry>,
    schema: SqliteSchemaProvider,
    tasks: RwLock<HashMap<Uuid, ImportReport>>,
}

impl Importer {
    pub fn new(database: impl AsRef<Path>, registry: Arc<ValueGeneratorRegistry>) -> Self {
        let database = database.as_ref().to_path_buf();
        Self {
            schema: SqliteSchemaProvider::new(&database),
            database,
            registry,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn database(&self) -> &Path {
        &self.database
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ValueGeneratorRegistry> {
        &self.registry
    }

    /// Metadata for `table` in the destination database.
    #[must_use]
    pub fn describe_table(&self, table: &str) -> TableStructure {
        self.schema.table_structure(table)
    }

    /// Every registered generator, sorted by id.
    #[must_use]
    pub fn generators(&self) -> Vec<GeneratorDescriptor> {
        self.registry.descriptors()
    }

    /// A report produced earlier by this importer.
    #[must_use]
    pub fn report(&self, task_id: Uuid) -> Option<ImportReport> {
        self.tasks.read().get(&task_id).cloned()
    }

    /// Number of reports kept in the task table.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// Import one file. Failures of any kind are reported, never raised.
    pub fn import_file(&self, path: impl AsRef<Path>, config: &ImportConfig) -> ImportReport {
        let path = path.as_ref();
        let span = info_span!("import", file = %path.display(), table = %config.table_name);
        let _guard = span.enter();

        let clock = Instant::now();
        let mut report = ImportReport::started(path, &config.table_name);

        match self.run(path, config, &mut report) {
            Ok(()) => info!(
                task = %report.task_id,
                total = report.total_records,
                success = report.success_records,
                failure = report.failure_records,
                "import finished"
            ),
            Err(e) => {
                error!(task = %report.task_id, error = %e, "import failed");
                report.success = false;
                report.message = e.to_string();
            }
        }

        report.finished_at = Utc::now();
        report.elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.tasks.write().insert(report.task_id, report.clone());
        report
    }

    /// Import several files with the same configuration, optionally in parallel.
    ///
    /// Reports come back in the order of `paths`.
    pub fn import_files(&self, paths: &[PathBuf], config: &ImportConfig, parallel: bool) -> Vec<ImportReport> {
        if parallel {
            paths.par_iter().map(|p| self.import_file(p, config)).collect()
        } else {
            paths.iter().map(|p| self.import_file(p, config)).collect()
        }
    }

    fn run(&self, path: &Path, config: &ImportConfig, report: &mut ImportReport) -> Result<()> {
        config.validate()?;

        let table = self.describe_table(&config.table_name);
        if !table.exists {
            return Err(EtlError::NotFound(table.message.unwrap_or_else(|| {
                format!("table {} does not exist", config.table_name)
            })));
        }

        let mut source = SpreadsheetSource::new(path)
            .header_row(config.header_row)
            .skip_header(true);
        if let Some(sheet) = &config.sheet_name {
            source = source.sheet(sheet.as_str());
        }
        source.open()?;

        let header = match source.header() {
            Ok(header) => header,
            Err(e) => {
                if let Err(close) = source.close() {
                    warn!(error = %close, "failed to close source");
                }
                return Err(e);
            }
        };

        let index = FieldMapper::new(config.case_insensitive).build_column_index(&header);
        let mapper = build_mapper(config, &table, &index, &self.registry);
        debug!(
            sheet = source.sheet_name().unwrap_or_default(),
            headers = index.len(),
            "read header row"
        );

        let sink = SqliteSink::new(&self.database, &table.table_name, config.write_mode());
        let mut pipeline = Pipeline::new(source, sink)
            .processor(RowMappingProcessor::new(mapper, index, config.data_start_row))
            .batch_size(config.batch_size)
            .stop_on_error(config.stop_on_error())
            .listener(TracingListener);

        match pipeline.run() {
            Ok(result) => {
                report.absorb(&result);
                if let Some(close) = result.close_errors.first() {
                    report.success = false;
                    report.message = format!("import did not complete: {close}");
                } else {
                    report.success = true;
                    report.message = summary(&result, &table.table_name);
                }
                Ok(())
            }
            Err(failure) => {
                report.absorb(&failure.partial);
                Err(failure.error)
            }
        }
    }
}

fn summary(result: &PipelineResult, table: &str) -> String {
    let mut message = format!(
        "imported {} of {} records into {table}",
        result.success_records, result.total_records
    );
    if result.failure_records > 0 {
        message.push_str(&format!(", {} failed", result.failure_records));
    }
    if result.stopped_early {
        message.push_str(", stopped at first failure");
    }
    message
}

/// Expand file paths and glob patterns into a sorted list of files.
///
/// Plain paths are kept as given, even when they do not exist, so that the
/// failure shows up in that file's report.
///
/// # Errors
///
/// Returns [`EtlError::Configuration`] for a malformed pattern and
/// [`EtlError::NotFound`] for a pattern that matches nothing.
pub fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if !input.contains(['*', '?', '[']) {
            files.push(PathBuf::from(input));
            continue;
        }
        let mut matched: Vec<PathBuf> = glob::glob(input)
            .map_err(|e| EtlError::Configuration(format!("invalid glob pattern '{input}': {e}")))?
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    warn!(pattern = input, error = %e, "unreadable glob match");
                    None
                }
            })
            .collect();
        if matched.is_empty() {
            return Err(EtlError::NotFound(format!("no files match '{input}'")));
        }
        matched.sort();
        files.append(&mut matched);
    }
    Ok(files)
}
