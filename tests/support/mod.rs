//! Workbook fixtures written at test time.

#![allow(dead_code)]

use anyhow::Result;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::{Path, PathBuf};

/// One cell to write.
#[derive(Debug, Clone)]
pub enum W {
    S(&'static str),
    N(f64),
    B(bool),
    Date(u16, u8, u8),
    DateTime(u16, u8, u8, u16, u8, u8),
    Blank,
}

/// Write a workbook with one sheet per `(name, rows)` entry.
pub fn write_sheets(path: &Path, sheets: &[(&str, Vec<Vec<W>>)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name)?;
        for (r, row) in rows.iter().enumerate() {
            let r = u32::try_from(r)?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c)?;
                match cell {
                    W::S(s) => {
                        worksheet.write_string(r, c, *s)?;
                    }
                    W::N(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                    W::B(b) => {
                        worksheet.write_boolean(r, c, *b)?;
                    }
                    W::Date(y, m, d) => {
                        let date = ExcelDateTime::from_ymd(*y, *m, *d)?;
                        worksheet.write_datetime_with_format(r, c, &date, &date_format)?;
                    }
                    W::DateTime(y, m, d, hh, mm, ss) => {
                        let dt = ExcelDateTime::from_ymd(*y, *m, *d)?.and_hms(*hh, *mm, *ss)?;
                        worksheet.write_datetime_with_format(r, c, &dt, &datetime_format)?;
                    }
                    W::Blank => {}
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Write a single-sheet workbook named `Sheet1`.
pub fn write_xlsx(path: &Path, rows: Vec<Vec<W>>) -> Result<()> {
    write_sheets(path, &[("Sheet1", rows)])
}

/// The orders sheet: `ID, NAME, AMOUNT` with the third data row missing its id.
pub fn orders_workbook(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("orders.xlsx");
    write_xlsx(
        &path,
        vec![
            vec![W::S("ID"), W::S("NAME"), W::S("AMOUNT")],
            vec![W::N(1.0), W::S("A"), W::N(10.0)],
            vec![W::N(2.0), W::S("B"), W::N(20.5)],
            vec![W::Blank, W::S("C"), W::N(30.0)],
        ],
    )?;
    Ok(path)
}
