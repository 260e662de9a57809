//! Row removal and column assignment.

use crate::error::{FileError, FileResult};
use crate::models::{Cell, RawTable};
use crate::schema::matcher::trim_trailing_empty;
use crate::schema::SchemaDefinition;

/// A row that survived removal, with its 1-based number in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberedRow {
    pub number: usize,
    pub cells: Vec<Cell>,
}

/// Remove rows by 1-based number in the original numbering.
///
/// Numbers beyond the table are ignored. Returns the kept rows and the
/// numbers actually removed, ascending.
pub fn remove_rows(table: &RawTable, skip: &[usize]) -> (Vec<NumberedRow>, Vec<usize>) {
    let mut kept = Vec::with_capacity(table.len());
    let mut removed = Vec::new();
    for (idx, cells) in table.iter().enumerate() {
        let number = idx + 1;
        if skip.contains(&number) {
            removed.push(number);
        } else {
            kept.push(NumberedRow {
                number,
                cells: cells.clone(),
            });
        }
    }
    (kept, removed)
}

/// Take the header row (by original number) out of the kept rows.
///
/// Blank rows are dropped from the data.
pub fn split_header(
    schema: &SchemaDefinition,
    rows: Vec<NumberedRow>,
) -> FileResult<(Vec<String>, Vec<NumberedRow>)> {
    let header_row = schema.header_row();
    let mut header = None;
    let mut data = Vec::with_capacity(rows.len());
    for row in rows {
        if row.number == header_row {
            header = Some(
                row.cells
                    .iter()
                    .map(|c| c.as_raw_string().trim().to_string())
                    .collect::<Vec<_>>(),
            );
        } else if row.cells.iter().any(|c| !c.is_empty()) {
            data.push(row);
        }
    }

    let header = header.ok_or_else(|| FileError::SchemaMismatch {
        schema: schema.name().to_string(),
        reason: format!("header row {} is missing", header_row),
    })?;
    Ok((header, data))
}

/// Column layout of the output.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    /// Output names: declared names, then extra source names (wildcard)
    pub names: Vec<String>,
    /// Declared names that differ from the source header
    pub renamed: usize,
}

impl ColumnLayout {
    pub fn width(&self) -> usize {
        self.names.len()
    }
}

/// Assign declared names positionally to the source header.
pub fn assign_columns(schema: &SchemaDefinition, header: &[String]) -> FileResult<ColumnLayout> {
    let header = trim_trailing_empty(header);
    let required = schema.required_count();

    if header.len() < required {
        return Err(FileError::InsufficientColumns {
            schema: schema.name().to_string(),
            required,
            found: header.len(),
        });
    }
    if !schema.wildcard() && header.len() > required {
        return Err(FileError::SchemaMismatch {
            schema: schema.name().to_string(),
            reason: format!(
                "{} columns found, schema allows {} and has no wildcard",
                header.len(),
                required
            ),
        });
    }

    let renamed = schema
        .columns()
        .iter()
        .zip(header)
        .filter(|(declared, source)| declared.as_str() != source.as_str())
        .count();

    let mut names: Vec<String> = schema.columns().to_vec();
    names.extend(header[required..].iter().cloned());

    Ok(ColumnLayout { names, renamed })
}

/// Bring a data row to exactly `width` cells.
///
/// Short rows are padded with empty cells. Long rows are cut only when the
/// surplus is empty.
pub fn fit_row(row: &mut NumberedRow, width: usize) -> FileResult<()> {
    if row.cells.len() < width {
        row.cells.resize(width, Cell::Empty);
        return Ok(());
    }
    if let Some(extra) = row.cells[width..].iter().position(|c| !c.is_empty()) {
        return Err(FileError::Parse(format!(
            "row {} has a value in column {}, beyond the {} header columns",
            row.number,
            width + extra + 1,
            width
        )));
    }
    row.cells.truncate(width);
    Ok(())
}
