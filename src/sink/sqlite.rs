use super::statement::{self, Statement};
use super::{Sink, WriteMode};
use crate::error::{EtlError, Result};
use crate::value::{FieldMap, Value};
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// Writes batches into one SQLite table inside a single run-wide transaction.
///
/// The database file must already exist; the sink never creates it. The
/// transaction starts with `BEGIN IMMEDIATE` at open, so concurrent runs
/// against the same file wait for each other instead of failing mid-run.
///
/// Records in one batch may carry different field sets. Each distinct set
/// gets its own prepared statement, executed in the order the set first
/// appears.
///
/// # Example
///
/// ```no_run
/// use sheetpipe::sink::{Sink, SqliteSink, WriteMode};
/// use sheetpipe::{FieldMap, Value};
///
/// let mut sink = SqliteSink::new("warehouse.db", "orders", WriteMode::Insert);
/// sink.open()?;
///
/// let mut row = FieldMap::new();
/// row.insert("ID".into(), Value::Int(1));
/// sink.write(&[row])?;
///
/// sink.close()?;
/// # Ok::<(), sheetpipe::EtlError>(())
/// ```
pub struct SqliteSink {
    path: PathBuf,
    table: String,
    mode: WriteMode,
    name: String,
    busy_timeout: Duration,
    conn: Option<Connection>,
    state: TxState,
    rows_written: usize,
}

impl SqliteSink {
    pub fn new(path: impl AsRef<Path>, table: impl Into<String>, mode: WriteMode) -> Self {
        let table = table.into();
        Self {
            path: path.as_ref().to_path_buf(),
            name: format!("sqlite:{table}"),
            table,
            mode,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conn: None,
            state: TxState::Idle,
            rows_written: 0,
        }
    }

    /// How long to wait for another writer's lock before giving up.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Rows changed by statements executed so far in this run.
    #[must_use]
    pub const fn rows_written(&self) -> usize {
        self.rows_written
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(conn)
    }

    fn rollback(&mut self) {
        if self.state != TxState::Active {
            return;
        }
        if let Some(conn) = &self.conn {
            match conn.execute_batch("ROLLBACK") {
                Ok(()) => warn!(table = %self.table, "rolled back import transaction"),
                Err(e) => error!(table = %self.table, error = %e, "rollback failed"),
            }
        }
        self.state = TxState::RolledBack;
    }
}

/// Group records by field set, keeping first-appearance order.
fn group_by_fields(batch: &[FieldMap]) -> Vec<(Vec<&str>, Vec<&FieldMap>)> {
    let mut groups: Vec<(Vec<&str>, Vec<&FieldMap>)> = Vec::new();
    for record in batch {
        let fields: Vec<&str> = record.keys().map(String::as_str).collect();
        match groups.iter_mut().find(|(set, _)| *set == fields) {
            Some((_, members)) => members.push(record),
            None => groups.push((fields, vec![record])),
        }
    }
    groups
}

fn write_batch(conn: &Connection, table: &str, mode: &WriteMode, batch: &[FieldMap]) -> Result<usize> {
    let mut changed = 0;
    for (fields, records) in group_by_fields(batch) {
        let Statement { sql, params } = match mode {
            WriteMode::Insert => statement::insert(table, &fields)?,
            WriteMode::Update { keys } => statement::update(table, &fields, keys)?,
        };
        debug!(sql = %sql, records = records.len(), "executing batch statement");
        let mut stmt = conn.prepare_cached(&sql)?;
        for record in records {
            let values = params
                .iter()
                .map(|p| {
                    record
                        .get(p)
                        .ok_or_else(|| EtlError::Write(format!("record is missing field {p}")))
                })
                .collect::<Result<Vec<&Value>>>()?;
            changed += stmt.execute(params_from_iter(values))?;
        }
    }
    Ok(changed)
}

impl Sink for SqliteSink {
    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        if let WriteMode::Update { keys } = &self.mode
            && keys.is_empty()
        {
            return Err(EtlError::Configuration(format!(
                "update mode for {} requires at least one key column",
                self.table
            )));
        }
        let conn = self
            .connect()
            .map_err(|e| EtlError::open(format!("database {}", self.path.display()), e))?;
        info!(path = %self.path.display(), table = %self.table, "opened import transaction");
        self.conn = Some(conn);
        self.state = TxState::Active;
        self.rows_written = 0;
        Ok(())
    }

    fn write(&mut self, batch: &[FieldMap]) -> Result<()> {
        if self.state != TxState::Active {
            return Err(EtlError::Write(format!(
                "sink for {} has no active transaction",
                self.table
            )));
        }
        if batch.is_empty() {
            return Ok(());
        }
        let result = match &self.conn {
            Some(conn) => write_batch(conn, &self.table, &self.mode, batch),
            None => Err(EtlError::Write(format!("sink for {} is not open", self.table))),
        };
        match result {
            Ok(changed) => {
                self.rows_written += changed;
                debug!(table = %self.table, records = batch.len(), changed, "wrote batch");
                Ok(())
            }
            Err(e) => {
                error!(table = %self.table, error = %e, "batch write failed");
                self.rollback();
                match e {
                    EtlError::Write(_) => Err(e),
                    other => Err(EtlError::Write(other.to_string())),
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let outcome = if self.state == TxState::Active {
            match conn.execute_batch("COMMIT") {
                Ok(()) => {
                    self.state = TxState::Committed;
                    info!(table = %self.table, rows = self.rows_written, "committed import transaction");
                    Ok(())
                }
                Err(e) => {
                    error!(table = %self.table, error = %e, "commit failed, rolling back");
                    if let Err(rb) = conn.execute_batch("ROLLBACK") {
                        error!(table = %self.table, error = %rb, "rollback after failed commit failed");
                    }
                    self.state = TxState::RolledBack;
                    Err(EtlError::Write(format!("commit failed: {e}")))
                }
            }
        } else {
            Ok(())
        };
        if let Err((_, e)) = conn.close() {
            warn!(table = %self.table, error = %e, "failed to close connection cleanly");
        }
        outcome
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SqliteSink {
    fn drop(&mut self) {
        if self.state == TxState::Active && self.conn.is_some() {
            warn!(table = %self.table, "sink dropped without close, rolling back");
            self.rollback();
        }
    }
}
