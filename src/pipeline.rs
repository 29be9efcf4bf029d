//! The run orchestrator: Source → processor chain → batches → Sink.
//!
//! A [`Pipeline`] owns one source, one sink, and one processor chain, and runs
//! exactly once. It moves through [`PipelineState`]s:
//!
//! ```text
//! Idle → Opened → Streaming → Draining → Closed
//!   └──────┴─────────┴───────────┴──────→ Failed
//! ```
//!
//! Each record is classified as a **success** (a field map, appended to the
//! current batch), a **skip** (the chain produced nothing), a **rejection**
//! (a stage aborted the context), or an **error** (a stage failed). The batch
//! is flushed as soon as it reaches the configured size, and once more when
//! the stream ends or `stop_on_error` cuts it short. The sink and the source
//! are closed whatever happens; close failures are logged and collected in
//! [`PipelineResult::close_errors`] rather than raised.
//!
//! A failed open, a failed batch write, or a source that cannot be iterated
//! ends the run with a [`PipelineFailure`] that still carries the partial
//! result.
//!
//! # Example
//!
//! ```
//! use sheetpipe::pipeline::Pipeline;
//! use sheetpipe::processor::processor_fn;
//! use sheetpipe::source::VecSource;
//! use sheetpipe::testing::RecordingSink;
//! use sheetpipe::{FieldMap, ProcessContext, Record, Value};
//!
//! let records = (1..=5)
//!     .map(|i| {
//!         let mut fields = FieldMap::new();
//!         fields.insert("ID".into(), Value::Int(i));
//!         Record::Fields(fields)
//!     })
//!     .collect();
//!
//! let mut pipeline = Pipeline::new(VecSource::new(records), RecordingSink::new())
//!     .processor(processor_fn("identity", |r: &Record, _ctx: &mut ProcessContext| Ok(Some(r.clone()))))
//!     .batch_size(2);
//!
//! let result = pipeline.run().map_err(|f| f.error)?;
//! assert_eq!(result.success_records, 5);
//! assert_eq!(pipeline.sink().batch_sizes(), vec![2, 2, 1]);
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

use crate::config::DEFAULT_BATCH_SIZE;
use crate::context::ProcessContext;
use crate::error::EtlError;
use crate::listener::PipelineListener;
use crate::processor::{Processor, ProcessorChain};
use crate::sink::Sink;
use crate::source::{Record, Source};
use crate::value::FieldMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opened,
    Streaming,
    Draining,
    Closed,
    Failed,
}

/// Why a record counted as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A stage aborted the record through the context
    Rejected,
    /// A stage returned an error
    Errored,
}

/// One failed record.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// Zero-based position in the source stream.
    pub position: usize,
    /// The record as it came from the source.
    pub source: Record,
    pub message: String,
    pub kind: FailureKind,
}

impl ErrorRecord {
    /// 1-based row number: the sheet row when known, the stream position otherwise.
    #[must_use]
    pub fn row_number(&self) -> usize {
        self.source
            .index()
            .map_or(self.position + 1, |i| i as usize + 1)
    }
}

/// Counts and failures for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineResult {
    /// Records pulled from the source.
    pub total_records: usize,
    /// Records that reached a batch.
    pub success_records: usize,
    /// Records rejected or errored.
    pub failure_records: usize,
    /// Records the chain dropped without error.
    pub skipped_records: usize,
    /// Sink write calls that succeeded.
    pub batches_written: usize,
    /// Records handed to successful sink writes.
    pub written_records: usize,
    /// Whether `stop_on_error` ended the stream early.
    pub stopped_early: bool,
    pub errors: Vec<ErrorRecord>,
    /// Failures raised while closing the sink or source.
    pub close_errors: Vec<String>,
}

impl PipelineResult {
    /// No record failed and nothing went wrong at close.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failure_records == 0 && self.close_errors.is_empty()
    }
}

/// A run-level failure, with whatever was counted before it happened.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    #[source]
    pub error: EtlError,
    pub partial: PipelineResult,
}

/// Orchestrates one run from a [`Source`] to a [`Sink`].
pub struct Pipeline<S, K> {
    source: S,
    sink: K,
    chain: ProcessorChain,
    batch_size: usize,
    stop_on_error: bool,
    listeners: Vec<Box<dyn PipelineListener>>,
    state: PipelineState,
}

impl<S: Source, K: Sink> Pipeline<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            chain: ProcessorChain::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            stop_on_error: false,
            listeners: Vec::new(),
            state: PipelineState::Idle,
        }
    }

    /// Append a stage to the processor chain.
    #[must_use]
    pub fn processor(mut self, stage: impl Processor + 'static) -> Self {
        self.chain.push(stage);
        self
    }

    /// Append a boxed stage to the processor chain.
    #[must_use]
    pub fn boxed_processor(mut self, stage: Box<dyn Processor>) -> Self {
        self.chain.push_boxed(stage);
        self
    }

    /// Records per sink write. Must be at least 1.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// End the stream at the first rejected or errored record.
    #[must_use]
    pub const fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: impl PipelineListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    /// Take the source and sink back.
    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] if the pipeline is misconfigured or has
    /// already run, if the source or sink cannot be opened, if the source
    /// cannot be iterated, or if a batch write fails. Record-level failures
    /// never surface here; they are counted in the result.
    pub fn run(&mut self) -> Result<PipelineResult, PipelineFailure> {
        let mut result = PipelineResult::default();

        if self.state != PipelineState::Idle {
            return Err(fail(
                EtlError::Configuration("pipeline has already run".into()),
                result,
            ));
        }
        if self.chain.is_empty() {
            self.state = PipelineState::Failed;
            return Err(fail(
                EtlError::Configuration("processor chain is empty".into()),
                result,
            ));
        }
        if self.batch_size == 0 {
            self.state = PipelineState::Failed;
            return Err(fail(
                EtlError::Configuration("batch size must be at least 1".into()),
                result,
            ));
        }

        let span = info_span!(
            "pipeline",
            source = %self.source.name(),
            sink = %self.sink.name(),
            batch_size = self.batch_size
        );
        let _guard = span.enter();

        if let Err(e) = self.source.open() {
            error!(error = %e, "failed to open source");
            self.state = PipelineState::Failed;
            return Err(fail(e, result));
        }
        if let Err(e) = self.sink.open() {
            error!(error = %e, "failed to open sink");
            self.state = PipelineState::Failed;
            if let Err(close) = self.source.close() {
                warn!(error = %close, "failed to close source");
                result.close_errors.push(format!("source: {close}"));
            }
            return Err(fail(e, result));
        }
        self.state = PipelineState::Opened;
        info!(stages = ?self.chain.names(), stop_on_error = self.stop_on_error, "pipeline opened");
        for listener in &mut self.listeners {
            listener.on_pipeline_start(self.source.name(), self.sink.name());
        }

        self.state = PipelineState::Streaming;
        let mut batch: Vec<FieldMap> = Vec::with_capacity(self.batch_size.min(4096));
        let streamed = stream(
            &mut self.source,
            &mut self.sink,
            &self.chain,
            &mut self.listeners,
            &mut batch,
            self.batch_size,
            self.stop_on_error,
            &mut result,
        );

        let outcome = streamed.and_then(|()| {
            self.state = PipelineState::Draining;
            flush(&mut self.sink, &mut batch, &mut self.listeners, &mut result)
        });

        if let Err(e) = self.sink.close() {
            warn!(error = %e, "failed to close sink");
            result.close_errors.push(format!("sink: {e}"));
        }
        if let Err(e) = self.source.close() {
            warn!(error = %e, "failed to close source");
            result.close_errors.push(format!("source: {e}"));
        }

        for listener in &mut self.listeners {
            listener.on_pipeline_complete(&result);
        }

        match outcome {
            Ok(()) => {
                self.state = PipelineState::Closed;
                info!(
                    total = result.total_records,
                    success = result.success_records,
                    failure = result.failure_records,
                    skipped = result.skipped_records,
                    batches = result.batches_written,
                    "pipeline finished"
                );
                Ok(result)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                error!(error = %e, "pipeline failed");
                Err(fail(e, result))
            }
        }
    }
}

impl<S, K> fmt::Debug for Pipeline<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.chain.names())
            .field("batch_size", &self.batch_size)
            .field("stop_on_error", &self.stop_on_error)
            .field("listeners", &self.listeners.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

const fn fail(error: EtlError, partial: PipelineResult) -> PipelineFailure {
    PipelineFailure { error, partial }
}

#[allow(clippy::too_many_arguments)]
fn stream<S: Source, K: Sink>(
    source: &mut S,
    sink: &mut K,
    chain: &ProcessorChain,
    listeners: &mut [Box<dyn PipelineListener>],
    batch: &mut Vec<FieldMap>,
    batch_size: usize,
    stop_on_error: bool,
    result: &mut PipelineResult,
) -> Result<(), EtlError> {
    let mut ctx = ProcessContext::new();
    let records = source.records()?;

    for (position, record) in records.enumerate() {
        result.total_records += 1;
        for listener in listeners.iter_mut() {
            listener.on_record_start(position);
        }

        let failure = match chain.run(&record, &mut ctx) {
            Err(e) => Some((FailureKind::Errored, e.to_string())),
            Ok(_) if ctx.is_aborted() => Some((
                FailureKind::Rejected,
                ctx.abort_reason().unwrap_or("record rejected").to_string(),
            )),
            Ok(Some(Record::Fields(fields))) if fields.is_empty() => {
                result.skipped_records += 1;
                debug!(position, "record has no fields, skipped");
                None
            }
            Ok(Some(Record::Fields(fields))) => {
                batch.push(fields);
                result.success_records += 1;
                for listener in listeners.iter_mut() {
                    listener.on_record_success(position);
                }
                if batch.len() >= batch_size {
                    flush(sink, batch, listeners, result)?;
                }
                None
            }
            Ok(Some(other)) => Some((
                FailureKind::Errored,
                format!("processor chain did not produce fields for {}", other.describe()),
            )),
            Ok(None) => {
                result.skipped_records += 1;
                debug!(position, "record skipped");
                None
            }
        };

        if ctx.is_aborted() {
            ctx.clear();
        }

        if let Some((kind, message)) = failure {
            debug!(position, ?kind, error = %message, "record failed");
            result.failure_records += 1;
            for listener in listeners.iter_mut() {
                listener.on_record_error(position, &message);
            }
            result.errors.push(ErrorRecord {
                position,
                source: record,
                message,
                kind,
            });
            if stop_on_error {
                info!(position, "stopping at first failed record");
                result.stopped_early = true;
                break;
            }
        }
    }
    Ok(())
}

fn flush<K: Sink>(
    sink: &mut K,
    batch: &mut Vec<FieldMap>,
    listeners: &mut [Box<dyn PipelineListener>],
    result: &mut PipelineResult,
) -> Result<(), EtlError> {
    if batch.is_empty() {
        return Ok(());
    }
    let size = batch.len();
    sink.write(batch)?;
    batch.clear();
    result.batches_written += 1;
    result.written_records += size;
    debug!(size, "flushed batch");
    for listener in listeners.iter_mut() {
        listener.on_batch_complete(size);
    }
    Ok(())
}
