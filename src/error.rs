//! Error taxonomy for import runs.
//!
//! Errors fall into two groups. Record-level errors ([`EtlError::MissingRequiredField`],
//! [`EtlError::Rejected`], [`EtlError::Validation`]) are caught at the pipeline's
//! per-record boundary and turned into error records. Everything else is a
//! run-level failure that ends the run.

use thiserror::Error;

/// Errors produced while reading, transforming, or writing records.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A source or sink could not be opened
    #[error("failed to open {resource}: {message}")]
    Open { resource: String, message: String },

    /// A required field resolved to nothing after source, generator, and default lookup
    #[error("missing required column: {column}")]
    MissingRequiredField { column: String },

    /// A processor deliberately aborted the record
    #[error("record rejected: {0}")]
    Rejected(String),

    /// A batch flush failed; the run's transaction has been rolled back
    #[error("batch write failed: {0}")]
    Write(String),

    /// Invalid run, mapping, or sink configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The source file extension is not a supported workbook format
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A named file, sheet, or table does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// One or more validators rejected a record
    #[error("validation failed: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Workbook decoding error
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Configuration decoding or report encoding error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EtlError {
    /// Whether this error belongs to a single record rather than the whole run.
    #[must_use]
    pub const fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredField { .. } | Self::Rejected(_) | Self::Validation(_)
        )
    }

    /// Wrap any error raised while opening `resource` as [`EtlError::Open`].
    ///
    /// [`EtlError::NotFound`] and [`EtlError::UnsupportedFormat`] pass through
    /// unchanged so callers can still tell them apart.
    pub fn open(resource: impl Into<String>, err: Self) -> Self {
        match err {
            Self::NotFound(_) | Self::UnsupportedFormat(_) | Self::Configuration(_) => err,
            Self::Open { .. } => err,
            other => Self::Open {
                resource: resource.into(),
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EtlError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, EtlError>;
