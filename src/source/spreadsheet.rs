use super::{Cell, Record, Row, Source};
use crate::error::{EtlError, Result};
use calamine::{Data, Range, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Workbook extensions accepted by [`SpreadsheetSource`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xls", "xlsx"];

struct Sheet {
    name: String,
    values: Range<Data>,
    formulas: Option<Range<String>>,
}

/// Reads one sheet of an `.xls` or `.xlsx` workbook.
///
/// The sheet is chosen by name, or the first sheet when no name is given.
/// Iteration starts at the header row, or just after it when
/// [`skip_header`](Self::skip_header) is set, and runs to the last used row.
/// Fully blank rows come through as [`Record::Blank`].
///
/// # Example
///
/// ```no_run
/// use sheetpipe::source::{Source, SpreadsheetSource};
///
/// let mut source = SpreadsheetSource::new("orders.xlsx")
///     .sheet("2024")
///     .header_row(0)
///     .skip_header(true);
/// source.open()?;
/// let header = source.header()?;
/// for record in source.records()? {
///     println!("{}", record.describe());
/// }
/// source.close()?;
/// # Ok::<(), sheetpipe::EtlError>(())
/// ```
pub struct SpreadsheetSource {
    path: PathBuf,
    name: String,
    sheet_name: Option<String>,
    header_row: u32,
    skip_header: bool,
    sheet: Option<Sheet>,
}

impl SpreadsheetSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            path,
            name,
            sheet_name: None,
            header_row: 0,
            skip_header: false,
            sheet: None,
        }
    }

    /// Read the named sheet instead of the first one.
    #[must_use]
    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    /// Zero-based index of the header row.
    #[must_use]
    pub const fn header_row(mut self, row: u32) -> Self {
        self.header_row = row;
        self
    }

    /// Start iteration after the header row rather than at it.
    #[must_use]
    pub const fn skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    /// Name of the sheet being read, once open.
    #[must_use]
    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet.as_ref().map(|s| s.name.as_str())
    }

    /// The header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not open.
    pub fn header(&self) -> Result<Row> {
        let sheet = self.loaded()?;
        Ok(read_row(sheet, self.header_row, last_column(sheet)))
    }

    fn loaded(&self) -> Result<&Sheet> {
        self.sheet
            .as_ref()
            .ok_or_else(|| EtlError::Configuration(format!("source '{}' is not open", self.name)))
    }

    fn check_extension(&self) -> Result<()> {
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(EtlError::UnsupportedFormat(format!(
                "{} (expected one of: {})",
                self.path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )))
        }
    }
}

impl Source for SpreadsheetSource {
    fn open(&mut self) -> Result<()> {
        if self.sheet.is_some() {
            return Ok(());
        }
        self.check_extension()?;
        if !self.path.is_file() {
            return Err(EtlError::NotFound(format!("file {}", self.path.display())));
        }

        let mut workbook = open_workbook_auto(&self.path)?;
        let sheet_names = workbook.sheet_names();
        let name = match &self.sheet_name {
            Some(wanted) => sheet_names
                .iter()
                .find(|n| *n == wanted)
                .cloned()
                .ok_or_else(|| {
                    EtlError::NotFound(format!("sheet '{wanted}' in {}", self.path.display()))
                })?,
            None => sheet_names.first().cloned().ok_or_else(|| {
                EtlError::NotFound(format!("any sheet in {}", self.path.display()))
            })?,
        };

        let values = workbook.worksheet_range(&name)?;
        // Not every format exposes formulas; cached values are enough without them.
        let formulas = workbook.worksheet_formula(&name).ok();
        debug!(
            file = %self.path.display(),
            sheet = %name,
            rows = values.height(),
            "opened spreadsheet"
        );
        self.sheet = Some(Sheet {
            name,
            values,
            formulas,
        });
        Ok(())
    }

    fn records(&mut self) -> Result<Box<dyn Iterator<Item = Record> + '_>> {
        let start = if self.skip_header {
            self.header_row + 1
        } else {
            self.header_row
        };
        let sheet = self.loaded()?;
        let Some((last_row, last_col)) = sheet.values.end() else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new((start..=last_row).map(move |index| {
            let row = read_row(sheet, index, last_col);
            if row.is_blank() {
                Record::Blank { index }
            } else {
                Record::Row(row)
            }
        })))
    }

    fn close(&mut self) -> Result<()> {
        if self.sheet.take().is_some() {
            debug!(file = %self.path.display(), "closed spreadsheet");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn last_column(sheet: &Sheet) -> u32 {
    sheet.values.end().map_or(0, |(_, col)| col)
}

fn read_row(sheet: &Sheet, index: u32, last_col: u32) -> Row {
    let cells = (0..=last_col)
        .map(|col| {
            let cell = sheet
                .values
                .get_value((index, col))
                .map_or(Cell::Empty, cell_from_data);
            let formula = sheet
                .formulas
                .as_ref()
                .and_then(|f| f.get_value((index, col)))
                .filter(|text| !text.is_empty());
            match formula {
                Some(text) => Cell::formula(cell, text.clone()),
                None => cell,
            }
        })
        .collect();
    Row::new(index, cells)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Int(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| Cell::Number(dt.as_f64()), Cell::DateTime),
        Data::DateTimeIso(s) => parse_iso_datetime(s).map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Error(e.to_string()),
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
