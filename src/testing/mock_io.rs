//! Temporary SQLite databases for tests.

use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A SQLite file in a temporary directory, deleted on drop.
///
/// # Example
///
/// ```
/// use sheetpipe::testing::TempDatabase;
///
/// let db = TempDatabase::with_schema("CREATE TABLE t (ID INTEGER);")?;
/// assert_eq!(db.count_rows("t")?, 0);
/// # Ok::<(), sheetpipe::EtlError>(())
/// ```
pub struct TempDatabase {
    dir: TempDir,
    path: PathBuf,
}

impl TempDatabase {
    /// Create the database and run `ddl` against it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created or
    /// the DDL fails.
    pub fn with_schema(ddl: &str) -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path)?;
        conn.execute_batch(ddl)?;
        Ok(Self { dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the database.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A path next to the database, for fixture files.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(filename)
    }

    /// Open a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    /// `SELECT COUNT(*)` from `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let conn = self.connect()?;
        let sql = format!("SELECT COUNT(*) FROM {}", crate::sink::statement::quote_table(table));
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    }
}
