//! Pre-built datasets for common import scenarios.

use super::builders::{RowBuilder, header_row};
use crate::mapping::FieldMapper;
use crate::processor::RowMappingProcessor;
use crate::source::{Record, VecSource};

/// DDL for the orders table used by [`orders_fixture`].
pub const ORDERS_DDL: &str = "CREATE TABLE orders (
    ID INTEGER NOT NULL,
    NAME TEXT,
    AMOUNT NUMERIC
);";

/// The orders sheet: header `ID, NAME, AMOUNT` and three data rows, the
/// last of which has no `ID`.
#[must_use]
pub fn orders_records() -> Vec<Record> {
    vec![
        Record::Row(header_row(0, &["ID", "NAME", "AMOUNT"])),
        RowBuilder::new().number(1.0).text("A").number(10.0).record(1),
        RowBuilder::new().number(2.0).text("B").number(20.5).record(2),
        RowBuilder::new().empty().text("C").number(30.0).record(3),
    ]
}

/// A source over the orders data rows plus the mapping stage for them.
///
/// `ID` is mapped as required, so the third data row always fails. With
/// `skip_header` the header row is left out of the stream, as a spreadsheet
/// source positioned after the header would do.
#[must_use]
pub fn orders_fixture(skip_header: bool) -> (VecSource, RowMappingProcessor) {
    let mut records = orders_records();
    let header = match records.remove(0) {
        Record::Row(row) => row,
        _ => header_row(0, &["ID", "NAME", "AMOUNT"]),
    };
    if !skip_header {
        records.insert(0, Record::Row(header.clone()));
    }

    let mut mapper = FieldMapper::new(true);
    mapper.add_mapping("ID", "ID", true);
    mapper.add_mapping("NAME", "NAME", false);
    mapper.add_mapping("AMOUNT", "AMOUNT", false);
    let index = mapper.build_column_index(&header);

    (
        VecSource::new(records).with_name("orders"),
        RowMappingProcessor::new(mapper, index, 1),
    )
}
