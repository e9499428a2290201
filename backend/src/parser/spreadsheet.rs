//! Spreadsheet sheet selection and cell rendering via calamine.
//!
//! Readers are tried in order: xlsx first sheet, legacy xls first sheet, then
//! format auto-detection over every sheet in file order. The first sheet with
//! a header row and at least one data row wins.

use calamine::{open_workbook, open_workbook_auto, Data, DataType, Range, Reader, Xls, Xlsx};
use serde::Serialize;
use std::fmt::{self, Display};
use std::io::{Read, Seek};
use std::path::Path;

use super::RawTable;
use crate::error::{IngestError, IngestResult};

/// Reader that produced the selected sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetReader {
    Xlsx,
    Xls,
    Auto,
}

impl Display for SheetReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SheetReader::Xlsx => "xlsx",
            SheetReader::Xls => "xls",
            SheetReader::Auto => "auto",
        })
    }
}

/// The sheet chosen for ingestion, with its cells.
#[derive(Debug, Clone)]
pub struct SheetSelection {
    pub reader: SheetReader,
    pub sheet: String,
    pub range: Range<Data>,
}

/// Select the sheet to ingest from a workbook.
pub fn select_sheet(path: &Path) -> IngestResult<SheetSelection> {
    match open_workbook::<Xlsx<_>, _>(path) {
        Ok(mut workbook) => match first_sheet(&mut workbook) {
            Ok((sheet, range)) => {
                return Ok(SheetSelection { reader: SheetReader::Xlsx, sheet, range })
            }
            Err(e) => tracing::debug!(error = %e, "xlsx reader found no usable first sheet"),
        },
        Err(e) => tracing::debug!(error = %e, "xlsx reader failed"),
    }

    match open_workbook::<Xls<_>, _>(path) {
        Ok(mut workbook) => match first_sheet(&mut workbook) {
            Ok((sheet, range)) => {
                return Ok(SheetSelection { reader: SheetReader::Xls, sheet, range })
            }
            Err(e) => tracing::debug!(error = %e, "xls reader found no usable first sheet"),
        },
        Err(e) => tracing::debug!(error = %e, "xls reader failed"),
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IngestError::format(format!("Cannot open workbook: {}", e)))?;

    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) if has_data_rows(&range) => {
                tracing::info!(sheet = %name, "using first non-empty sheet");
                return Ok(SheetSelection { reader: SheetReader::Auto, sheet: name, range });
            }
            Ok(_) => tracing::debug!(sheet = %name, "sheet is empty"),
            Err(e) => tracing::debug!(sheet = %name, error = %e, "sheet unreadable"),
        }
    }

    Err(IngestError::format("No readable sheets found in workbook"))
}

fn first_sheet<RS, R>(workbook: &mut R) -> Result<(String, Range<Data>), String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "no first sheet".to_string())?
        .map_err(|e| e.to_string())?;
    if !has_data_rows(&range) {
        return Err(format!("sheet '{}' has no data rows", name));
    }
    Ok((name, range))
}

/// A header row followed by at least one row with a non-empty cell.
fn has_data_rows(range: &Range<Data>) -> bool {
    range
        .rows()
        .skip(1)
        .any(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
}

/// First row becomes the header, the rest are data rows.
pub fn range_to_table(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().unwrap_or_default();
    let width = headers.len();
    let rows = rows
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();
    RawTable { headers, rows }
}

/// Render one cell as raw text.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(true) => "True".to_string(),
        Data::Bool(false) => "False".to_string(),
        other => match other.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => other.to_string(),
        },
    }
}
