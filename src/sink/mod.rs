//! Transactional destinations for mapped records.
//!
//! A [`Sink`] is opened once per run, receives batches of field maps, and is
//! closed once. [`SqliteSink`] holds a single connection and transaction for
//! the whole run: every batch lands in that transaction, `close` commits it,
//! and any write failure rolls back everything written so far.

mod sqlite;
pub mod statement;

pub use sqlite::SqliteSink;

use crate::error::Result;
use crate::value::FieldMap;

/// How records are applied to the destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// `INSERT` every record.
    #[default]
    Insert,
    /// `UPDATE` rows matched on the key columns, setting every other field.
    Update { keys: Vec<String> },
}

impl WriteMode {
    #[must_use]
    pub const fn is_update(&self) -> bool {
        matches!(self, Self::Update { .. })
    }
}

/// A batched, transactional destination.
pub trait Sink {
    /// Acquire the connection and start the run's transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be reached or the sink is
    /// misconfigured.
    fn open(&mut self) -> Result<()>;

    /// Write one batch.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Write`](crate::EtlError::Write) after rolling back
    /// the run's transaction.
    fn write(&mut self, batch: &[FieldMap]) -> Result<()>;

    /// Commit and release. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the transaction is rolled back first.
    fn close(&mut self) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

impl<K: Sink + ?Sized> Sink for Box<K> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn write(&mut self, batch: &[FieldMap]) -> Result<()> {
        (**self).write(batch)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
