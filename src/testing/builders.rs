//! Builders for raw rows and field maps.

use crate::source::{Cell, Record, Row};
use crate::value::{FieldMap, Value};
use chrono::NaiveDateTime;

/// A fluent builder for one raw row.
///
/// # Example
///
/// ```
/// use sheetpipe::testing::RowBuilder;
///
/// let row = RowBuilder::new()
///     .number(1.0)
///     .text("A")
///     .empty()
///     .build(3);
///
/// assert_eq!(row.index, 3);
/// assert_eq!(row.cells.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RowBuilder {
    cells: Vec<Cell>,
}

impl RowBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { cells: Vec::new() }
    }

    #[must_use]
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.cells.push(Cell::Text(value.into()));
        self
    }

    #[must_use]
    pub fn number(mut self, value: f64) -> Self {
        self.cells.push(Cell::Number(value));
        self
    }

    #[must_use]
    pub fn boolean(mut self, value: bool) -> Self {
        self.cells.push(Cell::Bool(value));
        self
    }

    #[must_use]
    pub fn datetime(mut self, value: NaiveDateTime) -> Self {
        self.cells.push(Cell::DateTime(value));
        self
    }

    #[must_use]
    pub fn empty(mut self) -> Self {
        self.cells.push(Cell::Empty);
        self
    }

    #[must_use]
    pub fn cell(mut self, cell: Cell) -> Self {
        self.cells.push(cell);
        self
    }

    /// Finish the row at zero-based sheet position `index`.
    #[must_use]
    pub fn build(self, index: u32) -> Row {
        Row::new(index, self.cells)
    }

    /// Finish as a [`Record`]; an all-blank row becomes [`Record::Blank`].
    #[must_use]
    pub fn record(self, index: u32) -> Record {
        let row = self.build(index);
        if row.is_blank() {
            Record::Blank { index }
        } else {
            Record::Row(row)
        }
    }
}

/// A header row of text cells at position `index`.
#[must_use]
pub fn header_row(index: u32, names: &[&str]) -> Row {
    names
        .iter()
        .fold(RowBuilder::new(), |b, name| b.text(*name))
        .build(index)
}

/// A field map from `(name, value)` pairs.
#[must_use]
pub fn fields(pairs: &[(&str, Value)]) -> FieldMap {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

/// `count` field-map records with an integer `ID` from 1 to `count`.
#[must_use]
pub fn numbered_records(count: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| {
            let id = i32::try_from(i).unwrap_or(i32::MAX);
            Record::Fields(fields(&[("ID", Value::Int(id))]))
        })
        .collect()
}
