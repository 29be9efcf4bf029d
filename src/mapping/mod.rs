//! Field mapping: from raw rows to destination field maps.
//!
//! A [`FieldMapper`] holds one [`FieldMapping`] per source column. For every
//! data row it resolves each mapping in a fixed order:
//!
//! 1. the source cell, looked up through the run's [`ColumnIndex`]
//! 2. the bound generator
//! 3. the bound default value
//!
//! A required mapping that resolves to nothing fails the record with
//! [`EtlError::MissingRequiredField`]. Optional mappings that resolve to
//! nothing are left out of the output entirely.
//!
//! # Example
//!
//! ```
//! use sheetpipe::mapping::FieldMapper;
//! use sheetpipe::source::{Cell, Row};
//! use sheetpipe::{ProcessContext, Value};
//!
//! let header = Row::new(0, vec![Cell::Text("Id".into()), Cell::Text("Name".into())]);
//! let row = Row::new(1, vec![Cell::Number(7.0), Cell::Text("Ada".into())]);
//!
//! let mut mapper = FieldMapper::new(true);
//! mapper.add_mapping("id", "ID", true);
//! mapper.add_mapping_with_default("nickname", "NICKNAME", false, "n/a");
//!
//! let index = mapper.build_column_index(&header);
//! let fields = mapper.extract_record(&row, &index, &ProcessContext::new())?;
//! assert_eq!(fields["ID"], Value::Int(7));
//! assert_eq!(fields["NICKNAME"], Value::Text("n/a".into()));
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

pub mod auto;

use crate::context::ProcessContext;
use crate::error::{EtlError, Result};
use crate::generator::ValueGenerator;
use crate::source::{Row, normalize_cell};
use crate::value::{FieldMap, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Prefix for mappings that have no source column and resolve only through
/// their default value or generator.
pub const VIRTUAL_COLUMN_PREFIX: &str = "__VIRTUAL_";

/// Rule binding one source column to one destination field.
#[derive(Clone)]
pub struct FieldMapping {
    pub source_column: String,
    pub target_field: String,
    pub required: bool,
    pub default_value: Option<String>,
    pub generator: Option<Arc<dyn ValueGenerator>>,
}

impl FieldMapping {
    pub fn new(source_column: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            target_field: target_field.into(),
            required: false,
            default_value: None,
            generator: None,
        }
    }

    /// A mapping with no source column, named after its target field.
    pub fn virtual_field(target_field: impl Into<String>) -> Self {
        let target_field = target_field.into();
        Self::new(format!("{VIRTUAL_COLUMN_PREFIX}{target_field}"), target_field)
    }

    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn generator(mut self, generator: Arc<dyn ValueGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.source_column.starts_with(VIRTUAL_COLUMN_PREFIX)
    }

    /// Resolve this mapping against an optional source value.
    ///
    /// # Errors
    ///
    /// Fails with [`EtlError::MissingRequiredField`] when the mapping is
    /// required and nothing resolved, or propagates a generator failure.
    pub fn resolve(&self, source: Option<Value>, ctx: &ProcessContext) -> Result<Option<Value>> {
        let value = match (source, &self.generator, &self.default_value) {
            (Some(v), _, _) => Some(v),
            (None, Some(generator), _) => Some(generator.generate(ctx)?),
            (None, None, Some(default)) => Some(Value::Text(default.clone())),
            (None, None, None) => None,
        };
        if value.is_none() && self.required {
            let column = if self.is_virtual() {
                &self.target_field
            } else {
                &self.source_column
            };
            return Err(EtlError::MissingRequiredField {
                column: column.clone(),
            });
        }
        Ok(value)
    }
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("source_column", &self.source_column)
            .field("target_field", &self.target_field)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("generator", &self.generator.as_ref().map(|g| g.id().to_string()))
            .finish()
    }
}

/// Normalized header name to column position, built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    case_insensitive: bool,
    positions: HashMap<String, usize>,
    names: Vec<(usize, String)>,
}

impl ColumnIndex {
    /// Position of `column` within the row-set, if it has a header.
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(&normalize_key(column, self.case_insensitive)).copied()
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Header names as they appear in the sheet, trimmed, in column order.
    pub fn headers(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(|(pos, name)| (*pos, name.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn normalize_key(column: &str, case_insensitive: bool) -> String {
    let trimmed = column.trim();
    if case_insensitive {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Ordered set of field mappings keyed by source column.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    case_insensitive: bool,
    mappings: Vec<FieldMapping>,
    keys: HashMap<String, usize>,
}

impl FieldMapper {
    /// Create an empty mapper. With `case_insensitive`, column keys compare
    /// without regard to case.
    #[must_use]
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Register a mapping. A later mapping for the same column key replaces
    /// the earlier one in place.
    pub fn add(&mut self, mapping: FieldMapping) -> &mut Self {
        let key = normalize_key(&mapping.source_column, self.case_insensitive);
        match self.keys.get(&key) {
            Some(&slot) => self.mappings[slot] = mapping,
            None => {
                self.keys.insert(key, self.mappings.len());
                self.mappings.push(mapping);
            }
        }
        self
    }

    pub fn add_mapping(
        &mut self,
        column: impl Into<String>,
        field: impl Into<String>,
        required: bool,
    ) -> &mut Self {
        self.add(FieldMapping::new(column, field).required(required))
    }

    pub fn add_mapping_with_default(
        &mut self,
        column: impl Into<String>,
        field: impl Into<String>,
        required: bool,
        default_value: impl Into<String>,
    ) -> &mut Self {
        self.add(
            FieldMapping::new(column, field)
                .required(required)
                .default_value(default_value),
        )
    }

    pub fn add_mapping_with_generator(
        &mut self,
        column: impl Into<String>,
        field: impl Into<String>,
        required: bool,
        generator: Arc<dyn ValueGenerator>,
    ) -> &mut Self {
        self.add(
            FieldMapping::new(column, field)
                .required(required)
                .generator(generator),
        )
    }

    /// The mapping registered for `column`, if any.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FieldMapping> {
        self.keys
            .get(&normalize_key(column, self.case_insensitive))
            .map(|&slot| &self.mappings[slot])
    }

    /// Mutable access to the mapping registered for `column`.
    pub fn get_mut(&mut self, column: &str) -> Option<&mut FieldMapping> {
        let slot = *self.keys.get(&normalize_key(column, self.case_insensitive))?;
        self.mappings.get_mut(slot)
    }

    /// Find the mapping that writes `field`, comparing without case.
    pub fn by_target_mut(&mut self, field: &str) -> Option<&mut FieldMapping> {
        self.mappings
            .iter_mut()
            .find(|m| m.target_field.eq_ignore_ascii_case(field))
    }

    #[must_use]
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Scan a header row into a [`ColumnIndex`]. Blank header cells are skipped.
    #[must_use]
    pub fn build_column_index(&self, header: &Row) -> ColumnIndex {
        let mut index = ColumnIndex {
            case_insensitive: self.case_insensitive,
            ..ColumnIndex::default()
        };
        for (pos, cell) in header.cells.iter().enumerate() {
            let Some(value) = normalize_cell(cell) else {
                continue;
            };
            let name = value.to_string();
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            index
                .positions
                .insert(normalize_key(name, self.case_insensitive), pos);
            index.names.push((pos, name.to_string()));
        }
        index
    }

    /// Resolve every mapping against one data row.
    ///
    /// # Errors
    ///
    /// Fails with [`EtlError::MissingRequiredField`] on the first required
    /// mapping that resolves to nothing, or propagates a generator failure.
    pub fn extract_record(
        &self,
        row: &Row,
        index: &ColumnIndex,
        ctx: &ProcessContext,
    ) -> Result<FieldMap> {
        let mut fields = FieldMap::new();
        for mapping in &self.mappings {
            let source = index
                .position(&mapping.source_column)
                .and_then(|pos| row.get(pos))
                .and_then(normalize_cell);
            if let Some(value) = mapping.resolve(source, ctx)? {
                fields.insert(mapping.target_field.clone(), value);
            }
        }
        Ok(fields)
    }
}
