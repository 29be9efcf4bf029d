//! Destination table metadata used for auto-mapping decisions.
//!
//! A [`SchemaProvider`] answers one question: what does table `X` look like?
//! The answer is a [`TableStructure`] value. A missing table is not an error:
//! the structure comes back with `exists == false` and a readable message.

use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::sink::statement::{quote_identifier, split_schema};

/// Logical category of a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Text,
    Clob,
    Numeric,
    Integer,
    BigInt,
    Float,
    Boolean,
    Date,
    Time,
    Timestamp,
    Binary,
    Other,
}

/// One destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub name: String,
    pub data_type: DataCategory,
    /// Declared type name, upper-cased, without size or scale.
    pub type_name: String,
    pub size: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
    /// 1-based position in the table definition.
    pub ordinal: u32,
}

impl TableColumn {
    /// A column is required when it is `NOT NULL` and has no default clause.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        !self.nullable && self.default_value.is_none()
    }
}

/// Snapshot of one table's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStructure {
    pub table_name: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Columns in ordinal order.
    pub columns: Vec<TableColumn>,
}

impl TableStructure {
    /// A structure for a table that could not be described.
    pub fn missing(table_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            exists: false,
            message: Some(message.into()),
            columns: Vec::new(),
        }
    }

    /// Look up a column by name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        let name = name.trim();
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Names of every required column.
    #[must_use]
    pub fn required_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_required())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Source of destination table metadata.
pub trait SchemaProvider {
    /// Describe `table`. Never fails: problems yield `exists == false`.
    fn table_structure(&self, table: &str) -> TableStructure;

    fn table_exists(&self, table: &str) -> bool {
        self.table_structure(table).exists
    }
}

/// Reads table metadata from a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteSchemaProvider {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteSchemaProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_secs(30),
        }
    }

    /// How long to wait while a writer holds the database lock.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl SchemaProvider for SqliteSchemaProvider {
    fn table_structure(&self, table: &str) -> TableStructure {
        match self.connect().and_then(|conn| describe_table(&conn, table)) {
            Ok(structure) => structure,
            Err(e) => TableStructure::missing(table, format!("failed to read metadata for {table}: {e}")),
        }
    }
}

/// Describe `table` using an existing connection.
///
/// # Errors
///
/// Returns an error if the metadata queries fail. A table that does not
/// exist is reported through `exists == false`, not as an error.
pub fn describe_table(conn: &Connection, table: &str) -> Result<TableStructure> {
    let (schema, name) = split_schema(table.trim());
    let master = match schema {
        Some(schema) => format!("{}.sqlite_master", quote_identifier(schema)),
        None => "sqlite_master".to_string(),
    };
    let declared: Option<String> = conn
        .query_row(
            &format!("SELECT name FROM {master} WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE"),
            [name],
            |row| row.get(0),
        )
        .optional()?;
    let Some(declared) = declared else {
        return Ok(TableStructure::missing(table, format!("table {table} does not exist")));
    };

    let mut stmt = conn.prepare(
        "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1, ?2) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([declared.as_str(), schema.unwrap_or("main")], |row| {
            let cid: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let declared_type: String = row.get(2)?;
            let not_null: i64 = row.get(3)?;
            let default_value: Option<String> = row.get(4)?;
            let pk: i64 = row.get(5)?;
            let parsed = parse_declared_type(&declared_type);
            Ok(TableColumn {
                name,
                data_type: parsed.category,
                type_name: parsed.name,
                size: parsed.size,
                scale: parsed.scale,
                nullable: not_null == 0,
                primary_key: pk > 0,
                default_value,
                ordinal: u32::try_from(cid + 1).unwrap_or(u32::MAX),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let table_name = match schema {
        Some(schema) => format!("{schema}.{declared}"),
        None => declared,
    };
    debug!(table = %table_name, columns = columns.len(), "described table");
    Ok(TableStructure {
        table_name,
        exists: true,
        message: None,
        columns,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct DeclaredType {
    name: String,
    size: Option<u32>,
    scale: Option<u32>,
    category: DataCategory,
}

static TYPE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$").ok()
});

fn parse_declared_type(declared: &str) -> DeclaredType {
    let captures = TYPE_PATTERN.as_ref().and_then(|re| re.captures(declared));
    let (name, size, scale) = match captures {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()).to_ascii_uppercase(),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
            caps.get(3).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (declared.trim().to_ascii_uppercase(), None, None),
    };
    let category = categorize(&name);
    DeclaredType {
        name,
        size,
        scale,
        category,
    }
}

fn categorize(type_name: &str) -> DataCategory {
    let t = type_name;
    if t.contains("BIGINT") {
        DataCategory::BigInt
    } else if t.contains("INT") {
        DataCategory::Integer
    } else if t.contains("BOOL") {
        DataCategory::Boolean
    } else if t.contains("TIMESTAMP") || t.contains("DATETIME") {
        DataCategory::Timestamp
    } else if t.contains("DATE") {
        DataCategory::Date
    } else if t.contains("TIME") {
        DataCategory::Time
    } else if t.contains("CLOB") {
        DataCategory::Clob
    } else if t.contains("CHAR") || t.contains("TEXT") {
        DataCategory::Text
    } else if t.contains("BLOB") {
        DataCategory::Binary
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        DataCategory::Float
    } else if t.contains("NUMERIC") || t.contains("DECIMAL") || t.contains("NUMBER") {
        DataCategory::Numeric
    } else {
        DataCategory::Other
    }
}
