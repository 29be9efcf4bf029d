//! Processor stages and the chain that runs them.
//!
//! Every stage consumes the previous stage's output together with the run's
//! [`ProcessContext`]. A stage may:
//!
//! - return `Ok(Some(record))` to pass a record on,
//! - return `Ok(None)` to drop the record quietly (counted as skipped),
//! - call [`ProcessContext::abort`] to reject the record,
//! - return `Err(_)` to fail the record.
//!
//! # Example
//!
//! ```
//! use sheetpipe::processor::{ProcessorChain, processor_fn};
//! use sheetpipe::{FieldMap, ProcessContext, Record, Value};
//!
//! let mut chain = ProcessorChain::new();
//! chain.push(processor_fn("reject-negative", |record: &Record, ctx: &mut ProcessContext| {
//!     if let Some(fields) = record.as_fields() {
//!         if fields.get("AMOUNT").and_then(Value::as_i64).is_some_and(|v| v < 0) {
//!             ctx.abort("negative amount");
//!         }
//!     }
//!     Ok(Some(record.clone()))
//! }));
//!
//! let mut fields = FieldMap::new();
//! fields.insert("AMOUNT".into(), Value::Int(-5));
//! let mut ctx = ProcessContext::new();
//! chain.run(&Record::Fields(fields), &mut ctx)?;
//! assert!(ctx.is_aborted());
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

use crate::context::ProcessContext;
use crate::error::Result;
use crate::mapping::{ColumnIndex, FieldMapper};
use crate::source::Record;

/// One transform stage.
pub trait Processor: Send {
    /// Transform `input`. See the module docs for the meaning of each outcome.
    ///
    /// # Errors
    ///
    /// Returns an error to fail the current record.
    fn process(&self, input: &Record, ctx: &mut ProcessContext) -> Result<Option<Record>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Ordered list of stages.
#[derive(Default)]
pub struct ProcessorChain {
    stages: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: impl Processor + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn push_boxed(&mut self, stage: Box<dyn Processor>) {
        self.stages.push(stage);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run `input` through every stage in order.
    ///
    /// Stops early when a stage yields `None` or aborts the context. After an
    /// abort the return value is `Ok(None)`; callers check
    /// [`ProcessContext::is_aborted`] to tell a rejection from a skip.
    ///
    /// # Errors
    ///
    /// Propagates the first stage error.
    pub fn run(&self, input: &Record, ctx: &mut ProcessContext) -> Result<Option<Record>> {
        let mut current: Option<Record> = None;
        for stage in &self.stages {
            let output = stage.process(current.as_ref().unwrap_or(input), ctx)?;
            if ctx.is_aborted() {
                return Ok(None);
            }
            match output {
                Some(record) => current = Some(record),
                None => return Ok(None),
            }
        }
        Ok(Some(current.unwrap_or_else(|| input.clone())))
    }
}

/// Turns raw rows into field maps with a [`FieldMapper`].
///
/// Blank rows and rows above the data start row produce no output. Records
/// that are already field maps pass through untouched.
#[derive(Debug, Clone)]
pub struct RowMappingProcessor {
    mapper: FieldMapper,
    index: ColumnIndex,
    data_start_row: u32,
}

impl RowMappingProcessor {
    #[must_use]
    pub const fn new(mapper: FieldMapper, index: ColumnIndex, data_start_row: u32) -> Self {
        Self {
            mapper,
            index,
            data_start_row,
        }
    }

    #[must_use]
    pub const fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }
}

impl Processor for RowMappingProcessor {
    fn process(&self, input: &Record, ctx: &mut ProcessContext) -> Result<Option<Record>> {
        match input {
            Record::Blank { .. } => Ok(None),
            Record::Row(row) if row.index < self.data_start_row => Ok(None),
            Record::Row(row) => {
                let fields = self.mapper.extract_record(row, &self.index, ctx)?;
                // Only unmapped cells were filled; nothing to write.
                if fields.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Record::Fields(fields)))
            }
            Record::Fields(_) => Ok(Some(input.clone())),
        }
    }

    fn name(&self) -> &str {
        "row-mapping"
    }
}

/// A processor backed by a closure. Build one with [`processor_fn`].
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&Record, &mut ProcessContext) -> Result<Option<Record>> + Send,
{
    fn process(&self, input: &Record, ctx: &mut ProcessContext) -> Result<Option<Record>> {
        (self.f)(input, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a named [`Processor`].
pub fn processor_fn<F>(name: impl Into<String>, f: F) -> FnProcessor<F>
where
    F: Fn(&Record, &mut ProcessContext) -> Result<Option<Record>> + Send,
{
    FnProcessor {
        name: name.into(),
        f,
    }
}
