//! Raw spreadsheet cells and their normalization into [`Value`]s.

use crate::value::Value;
use chrono::{NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use std::str::FromStr;

/// One raw cell as read from a workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    /// A plain numeric cell.
    Number(f64),
    /// A numeric cell the reader already knows is integral.
    Int(i64),
    Bool(bool),
    /// A numeric cell carrying a date/time number format.
    DateTime(NaiveDateTime),
    /// An error cell such as `#DIV/0!`.
    Error(String),
    /// A formula with its last cached result.
    Formula { cached: Box<Cell>, text: String },
}

impl Cell {
    /// Whether the cell holds nothing a mapping could use.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Build a formula cell from its cached result and source text.
    #[must_use]
    pub fn formula(cached: Self, text: impl Into<String>) -> Self {
        Self::Formula {
            cached: Box::new(cached),
            text: text.into(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match normalize_cell(self) {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

/// Normalize one cell into a field value.
///
/// * integral numbers within `i32` become [`Value::Int`], larger integral
///   numbers [`Value::Long`], fractional numbers [`Value::Decimal`]
/// * date-formatted cells become [`Value::Date`] at exactly midnight and
///   [`Value::Timestamp`] otherwise
/// * formulas normalize their cached result; an error or missing cached
///   result falls back to the formula text
/// * empty and error cells are absent
///
/// # Example
///
/// ```
/// use sheetpipe::source::{Cell, normalize_cell};
/// use sheetpipe::Value;
///
/// assert_eq!(normalize_cell(&Cell::Number(42.0)), Some(Value::Int(42)));
/// assert_eq!(normalize_cell(&Cell::Empty), None);
/// ```
#[must_use]
pub fn normalize_cell(cell: &Cell) -> Option<Value> {
    match cell {
        Cell::Empty | Cell::Error(_) => None,
        Cell::Text(s) => Some(Value::Text(s.clone())),
        Cell::Bool(b) => Some(Value::Bool(*b)),
        Cell::Int(i) => Some(integral(*i)),
        Cell::Number(f) => Some(normalize_number(*f)),
        Cell::DateTime(dt) => Some(normalize_datetime(*dt)),
        Cell::Formula { cached, text } => match cached.as_ref() {
            Cell::Error(_) | Cell::Empty => Some(Value::Text(text.clone())),
            other => normalize_cell(other),
        },
    }
}

fn integral(i: i64) -> Value {
    i32::try_from(i).map_or(Value::Long(i), Value::Int)
}

// i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn normalize_number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Text(f.to_string());
    }
    if f.fract() == 0.0 && f >= -I64_UPPER && f < I64_UPPER {
        #[allow(clippy::cast_possible_truncation)]
        return integral(f as i64);
    }
    // Display gives the shortest representation that round-trips.
    Decimal::from_str(&f.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(f))
        .map_or_else(|| Value::Text(f.to_string()), Value::Decimal)
}

fn normalize_datetime(dt: NaiveDateTime) -> Value {
    if dt.time() == NaiveTime::MIN {
        Value::Date(dt.date())
    } else {
        Value::Timestamp(dt)
    }
}
