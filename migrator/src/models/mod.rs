//! Domain models for the migration pipeline.
//!
//! - [`SourceKind`] - spreadsheet or delimited-text origin
//! - [`Cell`] - one typed value read from a source file
//! - [`CandidateFile`] - a discovered input moving through the pipeline
//! - [`TransformResult`] - the serialized output of one file
//! - [`Diagnostics`] - what the transformer did to produce it

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Source kind
// =============================================================================

/// Origin of the input files of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Excel workbooks (`.xlsx`), first worksheet.
    Xlsx,
    /// Delimited text (`.csv`).
    Csv,
}

impl SourceKind {
    /// File extension selected during discovery.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// Parse a setting value (`xlsx` / `csv`, case-insensitive).
    pub fn from_setting(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Some(Self::Xlsx),
            "csv" | "text" => Some(Self::Csv),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Cells
// =============================================================================

/// A typed cell.
///
/// Delimited text only yields `Empty` and `Text`; spreadsheets keep the type
/// the workbook stored, which drives numeric cleanup.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    /// Build a text cell, mapping the empty string to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Raw string form, without any formatting rule applied.
    pub fn as_raw_string(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            Cell::Date(d) => d.format("%Y%m%d").to_string(),
        }
    }
}

/// Rows of cells as read from a source, before any schema is applied.
pub type RawTable = Vec<Vec<Cell>>;

// =============================================================================
// Candidate file
// =============================================================================

/// A discovered input file.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Where the file was found
    pub path: PathBuf,
    /// Encoding used to decode it (`xlsx` for workbooks)
    pub encoding: String,
    /// Parsed rows
    pub rows: RawTable,
}

impl CandidateFile {
    pub fn new(path: impl Into<PathBuf>, encoding: impl Into<String>, rows: RawTable) -> Self {
        Self {
            path: path.into(),
            encoding: encoding.into(),
            rows,
        }
    }

    /// File name for reports.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    /// Base name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Header candidates at a 1-based row number, trimmed.
    pub fn header_at(&self, row: usize) -> Option<Vec<String>> {
        let row = self.rows.get(row.checked_sub(1)?)?;
        Some(row.iter().map(|c| c.as_raw_string().trim().to_string()).collect())
    }
}

/// File name of a path, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// Transform result
// =============================================================================

/// What the transformer did to a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Original 1-based row numbers removed (skip rows and header row)
    pub rows_removed: Vec<usize>,
    /// Columns that received a declared name
    pub columns_renamed: usize,
    /// Date cells rendered as `YYYYMMDD`
    pub dates_converted: usize,
    /// Numeric cells reformatted
    pub numeric_cleanups: usize,
    /// Special-character replacements applied
    pub substitutions: usize,
}

/// Output of one successfully transformed file. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// Schema the file was resolved against
    pub schema: String,
    /// Column names written on the first line
    pub header: Vec<String>,
    /// Data rows, in source order
    pub rows: Vec<Vec<String>>,
    /// Serialized file content (header line + rows)
    pub content: String,
    /// Transformation counters
    pub diagnostics: Diagnostics,
}

impl TransformResult {
    /// Name of the file written to the output directory.
    pub fn output_name(&self) -> String {
        format!("{}.csv", self.schema)
    }
}
