//! Field values flowing through the processor chain.
//!
//! Every stage of a run speaks the same closed set of value kinds, so a chain
//! of processors is statically typed without per-stage generics. An absent
//! value is modelled by leaving the field out of the [`FieldMap`].

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

/// Date format used for rendering and binding calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format used for rendering and binding timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single non-absent field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Decimal(Decimal),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// The kind of a [`Value`], used to describe what a generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Long,
    Decimal,
    Text,
    Bool,
    Date,
    Timestamp,
}

/// A transformed row: destination field name to value.
pub type FieldMap = BTreeMap<String, Value>;

impl Value {
    /// The kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Text(_) => ValueKind::Text,
            Self::Bool(_) => ValueKind::Bool,
            Self::Date(_) => ValueKind::Date,
            Self::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// Borrow the text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Widen integral values to `i64`.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Self::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

// Decimals, dates and timestamps bind as text and rely on column affinity.
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Int(v) => SqlValue::Integer(i64::from(*v)),
            Self::Long(v) => SqlValue::Integer(*v),
            Self::Bool(v) => SqlValue::Integer(i64::from(*v)),
            Self::Text(v) => return Ok(ToSqlOutput::from(v.as_str())),
            Self::Decimal(_) | Self::Date(_) | Self::Timestamp(_) => {
                SqlValue::Text(self.to_string())
            }
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

/// Render a field map as `{A=1, B=x}` for error reports.
#[must_use]
pub fn describe_fields(fields: &FieldMap) -> String {
    let parts: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", parts.join(", "))
}
