use super::{Record, Source};
use crate::error::{EtlError, Result};

/// A source backed by an in-memory list of records.
///
/// # Example
///
/// ```
/// use sheetpipe::source::{Source, VecSource};
/// use sheetpipe::{FieldMap, Record};
///
/// let mut source = VecSource::new(vec![Record::Fields(FieldMap::new())]);
/// source.open()?;
/// assert_eq!(source.records()?.count(), 1);
/// source.close()?;
/// source.close()?;
/// # Ok::<(), sheetpipe::EtlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    name: String,
    records: Vec<Record>,
    open: bool,
    close_count: usize,
}

impl VecSource {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            name: "memory".to_string(),
            records,
            open: false,
            close_count: 0,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// How many times [`close`](Source::close) actually released the source.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }
}

impl Source for VecSource {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn records(&mut self) -> Result<Box<dyn Iterator<Item = Record> + '_>> {
        if !self.open {
            return Err(EtlError::Configuration(format!(
                "source '{}' is not open",
                self.name
            )));
        }
        Ok(Box::new(self.records.iter().cloned()))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.close_count += 1;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
