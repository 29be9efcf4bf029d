//! Run configuration for one spreadsheet import.
//!
//! [`ImportConfig`] is plain serde data, so it can come from a TOML or JSON
//! file or be built in code. Every field has a default; a minimal TOML file
//! only names the table:
//!
//! ```
//! use sheetpipe::config::ImportConfig;
//!
//! let config = ImportConfig::from_toml_str(r#"
//!     tableName = "orders"
//!     batchSize = 500
//!
//!     [generators]
//!     ID = "snowflake"
//! "#)?;
//! assert_eq!(config.batch_size, 500);
//! assert!(config.auto_mapping);
//! assert!(!config.stop_on_error());
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

use crate::error::{EtlError, Result};
use crate::sink::WriteMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Default number of records per sink write.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Whether rows are inserted or used to update existing rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Insert,
    Update,
}

/// A destination-only field filled from a default or a generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtraField {
    pub column: String,
    pub default_value: Option<String>,
    pub generator: Option<String>,
}

/// Options for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    /// Destination table.
    pub table_name: String,
    /// Sheet to read; the first sheet when absent.
    pub sheet_name: Option<String>,
    /// Derive mappings from the header row and the table's columns.
    pub auto_mapping: bool,
    /// Header name to destination column, used when `auto_mapping` is off.
    pub column_mappings: BTreeMap<String, String>,
    /// Destination column to default value.
    pub default_values: BTreeMap<String, String>,
    /// Destination column to generator id.
    pub generators: BTreeMap<String, String>,
    pub extra_fields: Vec<ExtraField>,
    /// Destination columns that must resolve to a value.
    pub required_columns: Vec<String>,
    /// Zero-based header row.
    pub header_row: u32,
    /// Zero-based first data row.
    pub data_start_row: u32,
    /// Keep going after a failed record.
    pub ignore_errors: bool,
    pub batch_size: usize,
    pub mode: ImportMode,
    /// Key columns for update mode.
    pub key_columns: Vec<String>,
    /// Compare header names without regard to case.
    pub case_insensitive: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            sheet_name: None,
            auto_mapping: true,
            column_mappings: BTreeMap::new(),
            default_values: BTreeMap::new(),
            generators: BTreeMap::new(),
            extra_fields: Vec::new(),
            required_columns: Vec::new(),
            header_row: 0,
            data_start_row: 1,
            ignore_errors: true,
            batch_size: DEFAULT_BATCH_SIZE,
            mode: ImportMode::Insert,
            key_columns: Vec::new(),
            case_insensitive: true,
        }
    }
}

impl ImportConfig {
    /// A default configuration targeting `table`.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table_name: table.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Serialization`] if the document is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Serialization`] if the document is malformed.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or has another extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let config = match ext.as_str() {
            "toml" => Self::from_toml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            _ => {
                return Err(EtlError::UnsupportedFormat(format!(
                    "config file {} (expected .toml or .json)",
                    path.display()
                )));
            }
        };
        info!(path = %path.display(), table = %config.table_name, "loaded import config");
        Ok(config)
    }

    /// Check the options for contradictions.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(EtlError::Configuration("table name is required".into()));
        }
        if self.batch_size == 0 {
            return Err(EtlError::Configuration("batch size must be at least 1".into()));
        }
        if self.data_start_row <= self.header_row {
            return Err(EtlError::Configuration(format!(
                "data start row {} must come after header row {}",
                self.data_start_row, self.header_row
            )));
        }
        if self.mode == ImportMode::Update && self.key_columns.is_empty() {
            return Err(EtlError::Configuration(
                "update mode requires at least one key column".into(),
            ));
        }
        if let Some(extra) = self.extra_fields.iter().find(|e| e.column.trim().is_empty()) {
            return Err(EtlError::Configuration(format!(
                "extra field with empty column name: {extra:?}"
            )));
        }
        Ok(())
    }

    /// Whether the first failed record ends the run.
    #[must_use]
    pub const fn stop_on_error(&self) -> bool {
        !self.ignore_errors
    }

    /// The sink write mode these options describe.
    #[must_use]
    pub fn write_mode(&self) -> WriteMode {
        match self.mode {
            ImportMode::Insert => WriteMode::Insert,
            ImportMode::Update => WriteMode::Update {
                keys: self.key_columns.clone(),
            },
        }
    }
}
