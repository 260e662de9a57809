//! Schema-driven transformation of one file.
//!
//! Steps, in order:
//! 1. Remove skip rows (original numbering), take the header row out
//! 2. Assign declared column names positionally
//! 3. Render date columns as `YYYYMMDD`
//! 4. Clean up numeric cells
//! 5. Substitute special characters
//! 6. Serialize and check field counts
//!
//! # Example
//!
//! ```rust,ignore
//! use cpqmig::transform::{OutputOptions, Transformer};
//!
//! let transformer = Transformer::new(&replacements, OutputOptions::default());
//! let result = transformer.transform(&candidate, schema)?;
//! std::fs::write(out_dir.join(result.output_name()), &result.content)?;
//! ```

use serde::Serialize;

use super::rows::{assign_columns, fit_row, remove_rows, split_header};
use super::serialize::{verify_field_counts, write_records};
use super::values::{format_number, render_date, yyyymmdd};
use crate::error::{FileError, FileResult};
use crate::models::{CandidateFile, Cell, Diagnostics, TransformResult};
use crate::replace::ReplacementTable;
use crate::schema::SchemaDefinition;

/// Output format settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputOptions {
    /// Field delimiter of the output files
    pub delimiter: u8,
    /// Separator written for non-integral numbers
    pub decimal_separator: char,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            decimal_separator: '.',
        }
    }
}

/// Applies schemas to candidate files. Holds only shared, read-only state.
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    replacements: &'a ReplacementTable,
    options: OutputOptions,
}

impl<'a> Transformer<'a> {
    pub fn new(replacements: &'a ReplacementTable, options: OutputOptions) -> Self {
        Self {
            replacements,
            options,
        }
    }

    pub fn options(&self) -> OutputOptions {
        self.options
    }

    /// Transform `file` against its resolved `schema`.
    pub fn transform(
        &self,
        file: &CandidateFile,
        schema: &SchemaDefinition,
    ) -> FileResult<TransformResult> {
        let mut diagnostics = Diagnostics::default();

        // 1. Rows
        let (kept, mut removed) = remove_rows(&file.rows, schema.skip_rows());
        let (source_header, mut data) = split_header(schema, kept)?;
        removed.push(schema.header_row());
        removed.sort_unstable();
        diagnostics.rows_removed = removed;

        // 2. Columns
        let layout = assign_columns(schema, &source_header)?;
        diagnostics.columns_renamed = layout.renamed;
        for row in data.iter_mut() {
            fit_row(row, layout.width())?;
        }

        let date_columns: Vec<bool> = layout
            .names
            .iter()
            .map(|name| schema.is_date_column(name))
            .collect();

        let mut rows = Vec::with_capacity(data.len());
        for row in &data {
            let mut fields = Vec::with_capacity(layout.width());
            for (idx, cell) in row.cells.iter().enumerate() {
                // 3. Dates
                if date_columns[idx] {
                    match render_date(cell) {
                        Ok(Some(rendered)) => {
                            diagnostics.dates_converted += 1;
                            fields.push(rendered);
                        }
                        Ok(None) => fields.push(cell.as_raw_string().trim().to_string()),
                        Err(()) => {
                            return Err(FileError::InvalidDateValue {
                                column: layout.names[idx].clone(),
                                row: row.number,
                                value: cell.as_raw_string(),
                            });
                        }
                    }
                    continue;
                }

                // 4. Numbers
                let value = match cell {
                    Cell::Number(n) => {
                        diagnostics.numeric_cleanups += 1;
                        format_number(*n, self.options.decimal_separator)
                    }
                    Cell::Date(d) => {
                        diagnostics.dates_converted += 1;
                        yyyymmdd(*d)
                    }
                    other => other.as_raw_string(),
                };
                fields.push(value);
            }
            rows.push(fields);
        }

        // 5. Special characters
        let header = self.substitute_all(layout.names, &mut diagnostics);
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|fields| self.substitute_all(fields, &mut diagnostics))
            .collect();

        // 6. Serialization
        let content = write_records(self.options.delimiter, &header, &rows)?;
        verify_field_counts(&content, self.options.delimiter, header.len(), rows.len() + 1)?;

        Ok(TransformResult {
            schema: schema.name().to_string(),
            header,
            rows,
            content,
            diagnostics,
        })
    }

    fn substitute_all(&self, fields: Vec<String>, diagnostics: &mut Diagnostics) -> Vec<String> {
        fields
            .into_iter()
            .map(|field| {
                let (replaced, count) = self.replacements.apply(&field);
                diagnostics.substitutions += count;
                replaced.into_owned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTable;
    use crate::parser::parse_delimited;
    use crate::schema::{check_header, HeaderCheck, SchemaSpec};

    fn schema_with(spec: SchemaSpec) -> SchemaDefinition {
        SchemaDefinition::new("CPQMIGPN", spec).unwrap()
    }

    fn replacements() -> ReplacementTable {
        ReplacementTable::new(vec![
            ("Ñ".to_string(), "N".to_string()),
            ("º".to_string(), "o".to_string()),
        ])
        .unwrap()
    }

    /// Title row, header row, then `data_rows` rows of 96 columns, two of
    /// them (positions 10 and 20) holding date serials.
    fn cpqmigpn_workbook(data_rows: usize) -> (SchemaSpec, RawTable) {
        let columns: Vec<String> = (1..=96).map(|i| format!("COL{:03}", i)).collect();
        let mut spec = SchemaSpec::with_columns(&columns);
        spec.header_row = 2;
        spec.skip_rows = vec![1];
        spec.numeric_date_columns = vec!["COL010".to_string(), "COL020".to_string()];

        let mut table: RawTable = vec![vec![Cell::text("Price list export")]];
        table.push(columns.iter().map(|c| Cell::text(c.to_lowercase())).collect());
        for r in 0..data_rows {
            let row = (1..=96)
                .map(|c| match c {
                    10 | 20 => Cell::Number(45292.0 + r as f64),
                    1 => Cell::text(format!("PN-{}", r)),
                    2 => Cell::Number(2_500_000.0),
                    _ => Cell::Empty,
                })
                .collect();
            table.push(row);
        }
        (spec, table)
    }

    #[test]
    fn test_cpqmigpn_workbook_scenario() {
        let (spec, table) = cpqmigpn_workbook(149);
        assert_eq!(table.len(), 151);
        let schema = schema_with(spec);
        let file = CandidateFile::new("input_xlsx/CPQMIGPN.xlsx", "xlsx", table);
        let table_r = replacements();
        let transformer = Transformer::new(&table_r, OutputOptions::default());

        let result = transformer.transform(&file, &schema).unwrap();

        assert_eq!(result.rows.len(), 149);
        assert_eq!(result.header, schema.columns());
        assert!(result.rows.iter().all(|r| r.len() == 96));
        assert_eq!(result.rows[0][9], "20240101");
        assert_eq!(result.rows[0][19], "20240101");
        assert_eq!(result.rows[1][9], "20240102");
        assert!(result.rows.iter().all(|r| r[9].len() == 8 && r[19].len() == 8));
        assert_eq!(result.rows[0][1], "2500000");
        assert_eq!(result.diagnostics.rows_removed, vec![1, 2]);
        assert_eq!(result.diagnostics.columns_renamed, 96);
        assert_eq!(result.diagnostics.dates_converted, 298);
        assert_eq!(result.diagnostics.numeric_cleanups, 149);
        assert_eq!(result.output_name(), "CPQMIGPN.csv");

        // The output is itself a file of the same schema
        let reread = parse_delimited(&result.content, b'|').unwrap();
        assert_eq!(reread.len(), 150);
        let header: Vec<String> = reread[0].iter().map(|c| c.as_raw_string()).collect();
        assert_eq!(check_header(&schema, &header), HeaderCheck::Match);
    }

    #[test]
    fn test_skip_rows_use_original_numbering() {
        let mut spec = SchemaSpec::with_columns(&["A"]);
        spec.header_row = 2;
        spec.skip_rows = vec![3, 1];
        let schema = schema_with(spec);
        let table: RawTable = ["t", "A", "x", "r4", "r5"]
            .iter()
            .map(|v| vec![Cell::text(*v)])
            .collect();
        let file = CandidateFile::new("CPQMIGPN.csv", "utf-8", table);
        let empty = ReplacementTable::default();

        let result = Transformer::new(&empty, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap();

        assert_eq!(result.rows, vec![vec!["r4".to_string()], vec!["r5".to_string()]]);
        assert_eq!(result.diagnostics.rows_removed, vec![1, 2, 3]);
    }

    #[test]
    fn test_decimal_separator_and_text_digits() {
        let schema = schema_with(SchemaSpec::with_columns(&["IMPORTE", "REF"]));
        let table = vec![
            vec![Cell::text("IMPORTE"), Cell::text("REF")],
            vec![Cell::Number(1234.5), Cell::text("2500000.0")],
            vec![Cell::Number(7.0), Cell::text("0012")],
        ];
        let file = CandidateFile::new("CPQMIGPN.xlsx", "xlsx", table);
        let empty = ReplacementTable::default();
        let options = OutputOptions {
            delimiter: b';',
            decimal_separator: ',',
        };

        let result = Transformer::new(&empty, options).transform(&file, &schema).unwrap();

        assert_eq!(result.rows[0], vec!["1234,5", "2500000.0"]);
        assert_eq!(result.rows[1], vec!["7", "0012"]);
        assert_eq!(result.content, "IMPORTE;REF\n1234,5;2500000.0\n7;0012\n");
        assert_eq!(result.diagnostics.numeric_cleanups, 2);
    }

    #[test]
    fn test_substitution_and_delimiter_in_values() {
        let schema = schema_with(SchemaSpec::with_columns(&["NOMBRE", "NOTA"]));
        let table = vec![
            vec![Cell::text("NOMBRE"), Cell::text("NOTA")],
            vec![Cell::text("PEÑA"), Cell::text("Nº 3 | urgente")],
        ];
        let file = CandidateFile::new("CPQMIGPN.csv", "utf-8", table);
        let table_r = replacements();

        let result = Transformer::new(&table_r, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap();

        assert_eq!(result.rows[0], vec!["PENA", "No 3 | urgente"]);
        assert_eq!(result.diagnostics.substitutions, 2);
        assert_eq!(result.content.lines().nth(1), Some("PENA|\"No 3 | urgente\""));
    }

    #[test]
    fn test_invalid_date_reports_source_row() {
        let mut spec = SchemaSpec::with_columns(&["CODIGO", "FECHA"]);
        spec.numeric_date_columns = vec!["FECHA".to_string()];
        let schema = schema_with(spec);
        let table = vec![
            vec![Cell::text("CODIGO"), Cell::text("FECHA")],
            vec![Cell::text("A"), Cell::Empty],
            vec![Cell::text("B"), Cell::text("tomorrow")],
        ];
        let file = CandidateFile::new("CPQMIGPN.csv", "utf-8", table);
        let empty = ReplacementTable::default();

        let err = Transformer::new(&empty, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap_err();

        match err {
            FileError::InvalidDateValue { column, row, value } => {
                assert_eq!(column, "FECHA");
                assert_eq!(row, 3);
                assert_eq!(value, "tomorrow");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wildcard_extra_columns_keep_names_and_pad() {
        let schema = schema_with(SchemaSpec::with_columns(&["CODIGO", "*"]));
        let table = vec![
            vec![Cell::text("CODIGO"), Cell::text("Observación")],
            vec![Cell::text("A")],
        ];
        let file = CandidateFile::new("CPQMIGPN.csv", "utf-8", table);
        let empty = ReplacementTable::default();

        let result = Transformer::new(&empty, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap();

        assert_eq!(result.header, vec!["CODIGO", "Observación"]);
        assert_eq!(result.rows[0], vec!["A", ""]);
    }

    #[test]
    fn test_extra_date_column_matched_ignoring_case() {
        let mut spec = SchemaSpec::with_columns(&["CODIGO", "*"]);
        spec.numeric_date_columns = vec!["FECHA".into()];
        let schema = schema_with(spec);
        let table = vec![
            vec![Cell::text("CODIGO"), Cell::text("Fecha")],
            vec![Cell::text("A"), Cell::Number(45292.0)],
        ];
        let file = CandidateFile::new("CPQMIGPN.xlsx", "utf-8", table);
        let empty = ReplacementTable::default();

        let result = Transformer::new(&empty, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap();

        assert_eq!(result.header, vec!["CODIGO", "Fecha"]);
        assert_eq!(result.rows[0], vec!["A", "20240101"]);
        assert_eq!(result.diagnostics.dates_converted, 1);
    }

    #[test]
    fn test_insufficient_columns() {
        let schema = schema_with(SchemaSpec::with_columns(&["A", "B", "C"]));
        let table = vec![vec![Cell::text("A"), Cell::text("B")]];
        let file = CandidateFile::new("CPQMIGPN.csv", "utf-8", table);
        let empty = ReplacementTable::default();

        let err = Transformer::new(&empty, OutputOptions::default())
            .transform(&file, &schema)
            .unwrap_err();
        assert!(matches!(err, FileError::InsufficientColumns { .. }));
    }
}
