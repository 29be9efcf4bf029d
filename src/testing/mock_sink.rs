//! An in-memory sink that records what the pipeline asked it to do.

use crate::error::{EtlError, Result};
use crate::sink::Sink;
use crate::value::FieldMap;

/// A [`Sink`] that keeps every batch in memory.
///
/// Batches written during a run only become [`committed`](Self::committed)
/// when the sink is closed. A failed write discards all of them, the same
/// way a rolled-back transaction would.
///
/// # Example
///
/// ```
/// use sheetpipe::sink::Sink;
/// use sheetpipe::testing::{RecordingSink, fields};
/// use sheetpipe::Value;
///
/// let mut sink = RecordingSink::new().fail_on_write(2);
/// sink.open()?;
/// sink.write(&[fields(&[("ID", Value::Int(1))])])?;
/// assert!(sink.write(&[fields(&[("ID", Value::Int(2))])]).is_err());
/// sink.close()?;
/// assert!(sink.committed().is_empty());
/// # Ok::<(), sheetpipe::EtlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    name: String,
    writes: Vec<Vec<FieldMap>>,
    pending: Vec<FieldMap>,
    committed: Vec<FieldMap>,
    fail_on_write: Option<usize>,
    fail_open: bool,
    write_attempts: usize,
    open: bool,
    rolled_back: bool,
    open_count: usize,
    close_count: usize,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "recording".to_string(),
            ..Self::default()
        }
    }

    /// Fail the `n`-th write call (1-based).
    #[must_use]
    pub const fn fail_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Fail every call to open.
    #[must_use]
    pub const fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Every successful write call, in order.
    #[must_use]
    pub fn writes(&self) -> &[Vec<FieldMap>] {
        &self.writes
    }

    /// Size of each successful write call.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.writes.iter().map(Vec::len).collect()
    }

    /// Records made durable by the last close.
    #[must_use]
    pub fn committed(&self) -> &[FieldMap] {
        &self.committed
    }

    /// Number of write calls, including the failed one.
    #[must_use]
    pub const fn write_attempts(&self) -> usize {
        self.write_attempts
    }

    #[must_use]
    pub const fn open_count(&self) -> usize {
        self.open_count
    }

    /// How many times close actually released the sink.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }
}

impl Sink for RecordingSink {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(EtlError::Open {
                resource: self.name.clone(),
                message: "configured to fail".into(),
            });
        }
        if !self.open {
            self.open = true;
            self.open_count += 1;
            self.rolled_back = false;
            self.pending.clear();
        }
        Ok(())
    }

    fn write(&mut self, batch: &[FieldMap]) -> Result<()> {
        if !self.open || self.rolled_back {
            return Err(EtlError::Write("sink has no active transaction".into()));
        }
        self.write_attempts += 1;
        if self.fail_on_write == Some(self.write_attempts) {
            self.rolled_back = true;
            self.pending.clear();
            return Err(EtlError::Write(format!(
                "injected failure on write {}",
                self.write_attempts
            )));
        }
        self.writes.push(batch.to_vec());
        self.pending.extend_from_slice(batch);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.close_count += 1;
        if !self.rolled_back {
            self.committed.append(&mut self.pending);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
