//! Lazily iterated record sources.
//!
//! A [`Source`] is opened once, yields a finite single-pass sequence of
//! [`Record`]s, and is closed once. Closing twice is a no-op.
//!
//! - [`SpreadsheetSource`] reads one sheet of an `.xls`/`.xlsx` workbook.
//! - [`VecSource`] serves records from memory, mostly for tests and for
//!   callers that already hold their rows.

mod cell;
mod memory;
mod spreadsheet;

pub use cell::{Cell, normalize_cell};
pub use memory::VecSource;
pub use spreadsheet::{SUPPORTED_EXTENSIONS, SpreadsheetSource};

use crate::error::Result;
use crate::value::{FieldMap, describe_fields};

/// One physical row: its zero-based position in the sheet and its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: u32,
    pub cells: Vec<Cell>,
}

impl Row {
    #[must_use]
    pub const fn new(index: u32, cells: Vec<Cell>) -> Self {
        Self { index, cells }
    }

    /// The cell at `column`, if the row is that wide.
    #[must_use]
    pub fn get(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Whether every cell is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    /// Render as `Row 3: [1, A, 10]`, numbering rows from 1.
    #[must_use]
    pub fn describe(&self) -> String {
        let cells: Vec<String> = self.cells.iter().map(ToString::to_string).collect();
        format!("Row {}: [{}]", self.index + 1, cells.join(", "))
    }
}

/// A unit of work flowing from a source through the processor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A fully blank row, kept as a placeholder so row positions stay stable.
    Blank { index: u32 },
    /// A raw row straight from the source.
    Row(Row),
    /// A transformed record ready for the sink.
    Fields(FieldMap),
}

impl Record {
    /// Zero-based sheet row this record came from, when known.
    #[must_use]
    pub const fn index(&self) -> Option<u32> {
        match self {
            Self::Blank { index } => Some(*index),
            Self::Row(row) => Some(row.index),
            Self::Fields(_) => None,
        }
    }

    #[must_use]
    pub const fn as_row(&self) -> Option<&Row> {
        match self {
            Self::Row(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_fields(&self) -> Option<&FieldMap> {
        match self {
            Self::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// Human-readable rendering used in error reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Blank { index } => format!("Row {}: <blank>", index + 1),
            Self::Row(row) => row.describe(),
            Self::Fields(fields) => describe_fields(fields),
        }
    }
}

impl From<Row> for Record {
    fn from(row: Row) -> Self {
        Self::Row(row)
    }
}

impl From<FieldMap> for Record {
    fn from(fields: FieldMap) -> Self {
        Self::Fields(fields)
    }
}

/// An ordered, lazily iterated provider of records.
pub trait Source {
    /// Acquire the underlying resource. Opening an already open source is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened or the requested
    /// section does not exist.
    fn open(&mut self) -> Result<()>;

    /// Iterate the records, starting at the configured offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not open.
    fn records(&mut self) -> Result<Box<dyn Iterator<Item = Record> + '_>>;

    /// Release the underlying resource. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the resource fails.
    fn close(&mut self) -> Result<()>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn records(&mut self) -> Result<Box<dyn Iterator<Item = Record> + '_>> {
        (**self).records()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
