//! Workbook reading.
//!
//! Only the first worksheet is read. Row and column numbering is anchored at
//! A1 even when the used range starts further down, so configured row numbers
//! keep matching what operators see in Excel.

use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;

use crate::error::{FileError, FileResult};
use crate::models::{Cell, RawTable};

/// ZIP local file header; every `.xlsx` starts with it.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Whether `bytes` look like a workbook container.
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Read the first worksheet of an `.xlsx` into typed cells.
pub fn read_first_sheet(bytes: &[u8]) -> FileResult<RawTable> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| FileError::Parse(format!("cannot open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FileError::Parse("workbook has no worksheet".to_string()))?
        .map_err(|e| FileError::Parse(format!("cannot read worksheet: {}", e)))?;

    Ok(range_to_rows(&range))
}

fn range_to_rows(range: &Range<Data>) -> RawTable {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: RawTable = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    rows
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        // as_datetime honours the workbook's 1904 date system
        Data::DateTime(dt) if dt.is_datetime() => dt
            .as_datetime()
            .map(|d| Cell::Date(d.date()))
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::text(e.to_string()),
    }
}
