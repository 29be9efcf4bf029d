//! Record validation as a processor stage.
//!
//! Validators inspect a mapped [`FieldMap`] and report problems as
//! [`ValidationError`]s. A [`ValidatingProcessor`] runs a set of validators in
//! ascending [`order`](Validator::order) and, depending on its
//! [`ValidationMode`], drops, rejects, or fails records that do not pass.
//!
//! # Example
//!
//! ```
//! use sheetpipe::validation::{MaxLengthValidator, NotBlankValidator, ValidatingProcessor, ValidationMode};
//! use sheetpipe::processor::Processor;
//! use sheetpipe::{FieldMap, ProcessContext, Record, Value};
//!
//! let stage = ValidatingProcessor::new(ValidationMode::Reject)
//!     .with(NotBlankValidator::new(["NAME"]))
//!     .with(MaxLengthValidator::new("NAME", 3));
//!
//! let mut fields = FieldMap::new();
//! fields.insert("NAME".into(), Value::from("Grace"));
//!
//! let mut ctx = ProcessContext::new();
//! stage.process(&Record::Fields(fields), &mut ctx)?;
//! assert_eq!(ctx.abort_reason(), Some("NAME: must have at most 3 characters"));
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

use crate::context::ProcessContext;
use crate::error::{EtlError, Result};
use crate::processor::Processor;
use crate::source::Record;
use crate::value::FieldMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for validation checks.
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// One failed check on one record.
///
/// Displays as `COLUMN: message [code]`, leaving out the parts that are unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub column: Option<String>,
    pub message: String,
    /// Short machine-readable tag, such as `blank` or `too_long`.
    pub code: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            column: None,
            message: message.into(),
            code: None,
        }
    }

    /// A failure tied to one destination column.
    pub fn field(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{column}: {}", self.message)?,
            None => f.write_str(&self.message)?,
        }
        match &self.code {
            Some(code) => write!(f, " [{code}]"),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A rule applied to every mapped record.
pub trait Validator: Send + Sync {
    fn validate(&self, fields: &FieldMap, ctx: &ProcessContext) -> ValidationResult;

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Lower values run first.
    fn order(&self) -> i32 {
        0
    }
}

/// What a [`ValidatingProcessor`] does with a record that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Drop the record without reporting it
    Skip,
    /// Reject the record through the context; it is reported as a failure
    #[default]
    Reject,
    /// Fail the record with [`EtlError::Validation`]
    Fail,
}

/// Runs validators over field-map records.
#[derive(Default)]
pub struct ValidatingProcessor {
    mode: ValidationMode,
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatingProcessor {
    #[must_use]
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            validators: Vec::new(),
        }
    }

    /// Add a validator, keeping the list sorted by order.
    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self.validators.sort_by_key(|v| v.order());
        self
    }

    /// Run every validator and gather their errors.
    pub fn check(&self, fields: &FieldMap, ctx: &ProcessContext) -> ValidationResult {
        let mut all = Vec::new();
        for validator in &self.validators {
            if let Err(mut errors) = validator.validate(fields, ctx) {
                all.append(&mut errors);
            }
        }
        if all.is_empty() { Ok(()) } else { Err(all) }
    }
}

impl Processor for ValidatingProcessor {
    fn process(&self, input: &Record, ctx: &mut ProcessContext) -> Result<Option<Record>> {
        let Record::Fields(fields) = input else {
            return Ok(Some(input.clone()));
        };
        match self.check(fields, ctx) {
            Ok(()) => Ok(Some(input.clone())),
            Err(errors) => {
                let message = join_errors(&errors);
                match self.mode {
                    ValidationMode::Skip => Ok(None),
                    ValidationMode::Reject => {
                        ctx.abort(message);
                        Ok(None)
                    }
                    ValidationMode::Fail => Err(EtlError::Validation(message)),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "validation"
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Requires each named field to be present and, for text, not blank.
#[derive(Debug, Clone)]
pub struct NotBlankValidator {
    fields: Vec<String>,
}

impl NotBlankValidator {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for NotBlankValidator {
    fn validate(&self, fields: &FieldMap, _ctx: &ProcessContext) -> ValidationResult {
        let errors: Vec<ValidationError> = self
            .fields
            .iter()
            .filter(|name| {
                fields
                    .get(name.as_str())
                    .is_none_or(|v| v.as_text().is_some_and(|s| s.trim().is_empty()))
            })
            .map(|name| ValidationError::field(name.as_str(), "must not be blank").with_code("blank"))
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn name(&self) -> &str {
        "not-blank"
    }

    fn description(&self) -> &str {
        "Named fields must be present and non-blank"
    }

    fn order(&self) -> i32 {
        -10
    }
}

/// Limits the rendered length of one field, in characters.
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
    field: String,
    max: usize,
}

impl MaxLengthValidator {
    pub fn new(field: impl Into<String>, max: usize) -> Self {
        Self {
            field: field.into(),
            max,
        }
    }
}

impl Validator for MaxLengthValidator {
    fn validate(&self, fields: &FieldMap, _ctx: &ProcessContext) -> ValidationResult {
        match fields.get(&self.field) {
            Some(value) if value.to_string().chars().count() > self.max => Err(vec![ValidationError::field(
                self.field.as_str(),
                format!("must have at most {} characters", self.max),
            )]),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "max-length"
    }
}
